//! Sidebar navigation derived from front-matter `category` and `order`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::Document;
use crate::store::ContentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub text: String,
    pub link: String,
    pub path: String,
    pub order: i64,
}

impl NavItem {
    fn from_document(doc: &Document) -> Self {
        Self {
            text: doc.display_title(),
            link: doc.url(),
            path: doc.path.clone(),
            order: doc.meta.order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavGroup {
    pub category: String,
    pub items: Vec<NavItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavIndex {
    pub groups: Vec<NavGroup>,
}

impl NavIndex {
    /// Group documents by category and sort each group by `order`, then path.
    ///
    /// Categories named in `preferred` come first, in that order; the rest
    /// follow alphabetically.
    pub fn build(store: &ContentStore, preferred: &[String]) -> Self {
        let mut by_category: BTreeMap<&str, Vec<&Document>> = BTreeMap::new();
        for doc in store.documents() {
            by_category.entry(doc.meta.category()).or_default().push(doc);
        }

        let mut categories: Vec<&str> = by_category.keys().copied().collect();
        categories.sort_by_key(|c| {
            let rank = preferred.iter().position(|p| p.as_str() == *c).unwrap_or(usize::MAX);
            (rank, *c)
        });

        let groups = categories
            .into_iter()
            .map(|category| {
                let mut docs = by_category.remove(category).unwrap_or_default();
                docs.sort_by(|a, b| {
                    a.meta
                        .order()
                        .cmp(&b.meta.order())
                        .then_with(|| a.path.cmp(&b.path))
                });
                NavGroup {
                    category: category.to_string(),
                    items: docs.into_iter().map(NavItem::from_document).collect(),
                }
            })
            .collect();

        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &NavItem> {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    /// Previous and next entries around `path` in reading order.
    pub fn neighbors(&self, path: &str) -> (Option<&NavItem>, Option<&NavItem>) {
        let flat: Vec<&NavItem> = self.items().collect();
        let Some(idx) = flat.iter().position(|item| item.path == path) else {
            return (None, None);
        };

        let previous = idx.checked_sub(1).map(|i| flat[i]);
        let next = flat.get(idx + 1).copied();
        (previous, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(source: &str, category: &str, order: i64) -> Document {
        let text = format!("---\ntitle: {source}\ncategory: {category}\norder: {order}\n---\n");
        Document::parse(source, &text).unwrap()
    }

    fn paths(group: &NavGroup) -> Vec<&str> {
        group.items.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_empty_store_gives_empty_index() {
        let index = NavIndex::build(&ContentStore::default(), &[]);
        assert!(index.is_empty());
        assert_eq!(index.entry_count(), 0);
    }

    #[test]
    fn test_order_beats_input_order() {
        let forward = ContentStore::new(vec![doc("c/one.md", "components", 1), doc("c/two.md", "components", 2)]);
        let backward = ContentStore::new(vec![doc("c/two.md", "components", 2), doc("c/one.md", "components", 1)]);

        for store in [forward, backward] {
            let index = NavIndex::build(&store, &[]);
            assert_eq!(paths(&index.groups[0]), vec!["/c/one", "/c/two"]);
        }

        // Order wins over path ordering too
        let store = ContentStore::new(vec![doc("c/a.md", "components", 2), doc("c/z.md", "components", 1)]);
        let index = NavIndex::build(&store, &[]);
        assert_eq!(paths(&index.groups[0]), vec!["/c/z", "/c/a"]);
    }

    #[test]
    fn test_ties_break_by_path() {
        let store = ContentStore::new(vec![doc("c/b.md", "x", 0), doc("c/a.md", "x", 0)]);
        let index = NavIndex::build(&store, &[]);
        assert_eq!(paths(&index.groups[0]), vec!["/c/a", "/c/b"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let store = ContentStore::new(vec![
            doc("c/a.md", "services", 3),
            doc("c/b.md", "components", 1),
            doc("c/c.md", "components", 1),
            doc("c/d.md", "guides", -1),
        ]);
        assert_eq!(NavIndex::build(&store, &[]), NavIndex::build(&store, &[]));
    }

    #[test]
    fn test_group_ordering() {
        let store = ContentStore::new(vec![
            doc("c/a.md", "services", 0),
            doc("c/b.md", "components", 0),
            doc("c/c.md", "getting-started", 0),
        ]);

        let alphabetical = NavIndex::build(&store, &[]);
        let names: Vec<&str> = alphabetical.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["components", "getting-started", "services"]);

        let preferred = NavIndex::build(&store, &["getting-started".to_string()]);
        let names: Vec<&str> = preferred.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["getting-started", "components", "services"]);
    }

    #[test]
    fn test_neighbors_follow_reading_order() {
        let store = ContentStore::new(vec![
            doc("c/a.md", "components", 1),
            doc("c/b.md", "components", 2),
            doc("c/c.md", "services", 1),
        ]);
        let index = NavIndex::build(&store, &[]);

        let (prev, next) = index.neighbors("/c/b");
        assert_eq!(prev.unwrap().path, "/c/a");
        assert_eq!(next.unwrap().path, "/c/c");

        let (prev, next) = index.neighbors("/c/a");
        assert!(prev.is_none());
        assert_eq!(next.unwrap().path, "/c/b");

        assert_eq!(index.neighbors("/nope"), (None, None));
    }
}
