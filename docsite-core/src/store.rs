//! Immutable snapshot of every document available to one build.

use std::collections::{BTreeMap, BTreeSet};

use crate::document::Document;

#[derive(Debug, Default)]
pub struct ContentStore {
    documents: Vec<Document>,
    by_path: BTreeMap<String, usize>,
}

impl ContentStore {
    /// Documents are kept sorted by route path so every consumer sees the
    /// same iteration order regardless of how they were discovered.
    /// A later document with a duplicate path replaces the earlier one.
    pub fn new(documents: Vec<Document>) -> Self {
        let mut unique: BTreeMap<String, Document> = BTreeMap::new();
        for document in documents {
            if let Some(previous) = unique.insert(document.path.clone(), document) {
                tracing::warn!(
                    path = %previous.path,
                    source = %previous.source.display(),
                    "Duplicate document path, keeping the last one"
                );
            }
        }

        let documents: Vec<Document> = unique.into_values().collect();
        let by_path = documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| (doc.path.clone(), idx))
            .collect();

        Self { documents, by_path }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.by_path.get(path).map(|&idx| &self.documents[idx])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.documents.iter().map(|d| d.meta.category()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, text: &str) -> Document {
        Document::parse(source, text).unwrap()
    }

    #[test]
    fn test_documents_sorted_by_path() {
        let store = ContentStore::new(vec![
            doc("content/b.md", ""),
            doc("content/a.md", ""),
        ]);
        let paths: Vec<&str> = store.paths().collect();
        assert_eq!(paths, vec!["/content/a", "/content/b"]);
        assert_eq!(store.documents()[0].path, "/content/a");
    }

    #[test]
    fn test_lookup_and_categories() {
        let store = ContentStore::new(vec![
            doc("content/a.md", "---\ncategory: components\n---\n"),
            doc("content/b.md", "---\ncategory: services\n---\n"),
            doc("content/c.md", ""),
        ]);

        assert!(store.contains("/content/a"));
        assert!(store.get("/content/missing").is_none());
        assert_eq!(store.get("/content/b").unwrap().meta.category(), "services");
        assert_eq!(
            store.categories().into_iter().collect::<Vec<_>>(),
            vec!["components", "services", "uncategorized"]
        );
    }

    #[test]
    fn test_duplicate_paths_keep_last() {
        let store = ContentStore::new(vec![
            doc("content/a.md", "---\ntitle: First\n---\n"),
            doc("content/a.md", "---\ntitle: Second\n---\n"),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("/content/a").unwrap().meta.title(), "Second");
    }
}
