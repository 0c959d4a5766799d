//! Internal cross-link checks.
//!
//! Bodies are scanned for root-relative references under the content prefix
//! (`/content/...` by default). Each reference must resolve to a document in
//! the store; the ones that don't are reported, never rewritten.

use regex::Regex;
use serde::Serialize;

use crate::document::Document;
use crate::store::ContentStore;

pub const DEFAULT_CONTENT_PREFIX: &str = "/content/";

/// A reference to a page that doesn't exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedLink {
    /// Route of the document containing the reference.
    pub source: String,
    /// The reference as written.
    pub target: String,
    /// 1-based line within the document body.
    pub line: usize,
}

impl std::fmt::Display for UnresolvedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: unresolved link to {}", self.source, self.line, self.target)
    }
}

pub struct LinkResolver {
    pattern: Regex,
}

impl LinkResolver {
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        // A root prefix needs at least one path character after the slash, so
        // a lone `/` in prose and `//host` URLs don't count.
        let (prefix, tail) = if trimmed.is_empty() {
            ("/".to_string(), r"[\w.~%-][\w.~%/-]*")
        } else {
            (format!("/{trimmed}/"), r"[\w.~%/-]*")
        };
        // The leading group keeps `https://host/content/...` and
        // `../content/...` from counting as internal references.
        let pattern = format!(r#"(?:^|[^\w./:~-])({}{tail})"#, regex::escape(&prefix));

        Self {
            pattern: Regex::new(&pattern).expect("escaped link pattern is a valid regex"),
        }
    }

    /// Every internal reference in `body` as `(line, target)` pairs.
    pub fn references<'a>(&self, body: &'a str) -> Vec<(usize, &'a str)> {
        let mut found = Vec::new();
        for (idx, line) in body.lines().enumerate() {
            for captures in self.pattern.captures_iter(line) {
                if let Some(m) = captures.get(1) {
                    let target = m.as_str().trim_end_matches(['.', ',', ';', ':']);
                    found.push((idx + 1, target));
                }
            }
        }
        found
    }

    /// Check one document's references against the store.
    pub fn check(&self, document: &Document, store: &ContentStore) -> Vec<UnresolvedLink> {
        self.references(&document.body)
            .into_iter()
            .filter(|(_, target)| !resolves(target, store))
            .map(|(line, target)| {
                let link = UnresolvedLink {
                    source: document.path.clone(),
                    target: target.to_string(),
                    line,
                };
                tracing::warn!(
                    source = %link.source,
                    line = link.line,
                    target = %link.target,
                    "Unresolved link"
                );
                link
            })
            .collect()
    }

    /// Check every document in the store.
    pub fn check_all(&self, store: &ContentStore) -> Vec<UnresolvedLink> {
        store
            .documents()
            .iter()
            .flat_map(|doc| self.check(doc, store))
            .collect()
    }
}

impl Default for LinkResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_PREFIX)
    }
}

/// Whether `target` names a document, ignoring fragments, query strings,
/// trailing slashes and `.html`/`.md` suffixes. Directory links resolve to
/// the directory's `index` page.
pub fn resolves(target: &str, store: &ContentStore) -> bool {
    let path = normalize(target);
    store.contains(&path) || store.contains(&format!("{path}/index"))
}

fn normalize(target: &str) -> String {
    let end = target.find(['#', '?']).unwrap_or(target.len());
    let mut path = target[..end].trim_end_matches('/');
    for suffix in ["/index.html", ".html", ".md"] {
        if let Some(stripped) = path.strip_suffix(suffix) {
            path = stripped;
            break;
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> ContentStore {
        ContentStore::new(vec![
            Document::parse("content/components/button.md", "# Button").unwrap(),
            Document::parse("content/services/index.md", "# Services").unwrap(),
        ])
    }

    fn page(body: &str) -> Document {
        Document::parse("content/guide.md", body).unwrap()
    }

    #[test]
    fn test_finds_references_in_links_and_prose() {
        let resolver = LinkResolver::default();
        let body = "See [button](/content/components/button).\nAlso /content/services/index, and\n<a href=\"/content/foo\">x</a>";

        assert_eq!(
            resolver.references(body),
            vec![
                (1, "/content/components/button"),
                (2, "/content/services/index"),
                (3, "/content/foo"),
            ]
        );
    }

    #[test]
    fn test_root_prefix_finds_references() {
        let resolver = LinkResolver::new("/");
        let body = "Read [intro](/guides/intro) and a / b, not //cdn.example.com/x";
        assert_eq!(resolver.references(body), vec![(1, "/guides/intro")]);
    }

    #[test]
    fn test_ignores_external_and_relative_urls() {
        let resolver = LinkResolver::default();
        let body = "https://example.com/content/foo/bar ../content/x mycontent/y";
        assert!(resolver.references(body).is_empty());
    }

    #[test]
    fn test_missing_target_reports_once() {
        let resolver = LinkResolver::default();
        let doc = page("Broken: [bar](/content/foo/bar)\n");

        let unresolved = resolver.check(&doc, &store());
        assert_eq!(
            unresolved,
            vec![UnresolvedLink {
                source: "/content/guide".to_string(),
                target: "/content/foo/bar".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_variants_resolve() {
        let store = store();
        for target in [
            "/content/components/button",
            "/content/components/button/",
            "/content/components/button#props",
            "/content/components/button.html",
            "/content/components/button.md",
            "/content/services",
            "/content/services/",
            "/content/services/index",
            "/content/services/index.html",
            "/content/services?tab=api",
        ] {
            assert!(resolves(target, &store), "{target} should resolve");
        }
        assert!(!resolves("/content/components", &store));
    }

    #[test]
    fn test_custom_prefix() {
        let resolver = LinkResolver::new("docs");
        let refs = resolver.references("[a](/docs/intro) [b](/content/intro)");
        assert_eq!(refs, vec![(1, "/docs/intro")]);
    }

    #[test]
    fn test_check_all_collects_every_document() {
        let store = ContentStore::new(vec![
            Document::parse("content/a.md", "/content/b and /content/missing").unwrap(),
            Document::parse("content/b.md", "/content/gone").unwrap(),
        ]);
        let unresolved = LinkResolver::default().check_all(&store);
        let targets: Vec<&str> = unresolved.iter().map(|u| u.target.as_str()).collect();
        assert_eq!(targets, vec!["/content/missing", "/content/gone"]);
    }
}
