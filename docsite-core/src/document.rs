use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::markdown;

const INDEX_STEM: &str = "index";

/// A single Markdown page of the site.
#[derive(Debug, Clone)]
pub struct Document {
    /// Route path, e.g. `/content/components/button`.
    pub path: String,
    /// Source file relative to the content root.
    pub source: PathBuf,
    pub meta: FrontMatter,
    pub body: String,
}

impl Document {
    /// Build a document from raw file text. `source` is relative to the
    /// content root and decides the route.
    pub fn parse<P: AsRef<Path>>(source: P, text: &str) -> Result<Self, FrontMatterError> {
        let source = source.as_ref();
        let (meta, body) = frontmatter::parse(text)?;

        Ok(Self {
            path: route_for(source),
            source: source.to_path_buf(),
            meta,
            body: body.to_string(),
        })
    }

    pub fn is_index(&self) -> bool {
        self.source.file_stem().is_some_and(|s| s == INDEX_STEM)
    }

    /// Title shown in menus: front matter first, then the first `#` heading,
    /// then the file name.
    pub fn display_title(&self) -> String {
        if !self.meta.title().is_empty() {
            return self.meta.title().to_string();
        }
        if let Some(title) = markdown::first_title(&self.body) {
            return title;
        }
        let stem = if self.is_index() {
            self.source.parent().and_then(Path::file_name)
        } else {
            self.source.file_stem()
        };
        stem.map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Home".to_string())
    }

    /// URL the page is served from. Index pages live at their directory.
    pub fn url(&self) -> String {
        if self.is_index() {
            let dir = self.path.strip_suffix(INDEX_STEM).unwrap_or(&self.path);
            if dir.is_empty() { "/".to_string() } else { dir.to_string() }
        } else {
            format!("{}/", self.path)
        }
    }

    /// File written for this page, relative to the output directory.
    pub fn out_path(&self) -> PathBuf {
        let relative = PathBuf::from(self.path.trim_start_matches('/'));
        if self.is_index() {
            relative.with_file_name("index.html")
        } else {
            relative.join("index.html")
        }
    }

    pub fn summary(&self) -> DocumentSummary<'_> {
        DocumentSummary {
            title: self.display_title(),
            description: self.meta.description().to_string(),
            category: self.meta.category().to_string(),
            order: self.meta.order(),
            path: self.path.clone(),
            url: self.url(),
            extra: &self.meta.extra,
        }
    }
}

/// Serializable view handed to templates.
#[derive(Debug, Serialize)]
pub struct DocumentSummary<'a> {
    pub title: String,
    pub description: String,
    pub category: String,
    pub order: i64,
    pub path: String,
    pub url: String,
    pub extra: &'a std::collections::BTreeMap<String, serde_yaml::Value>,
}

/// `content/components/button.md` becomes `/content/components/button`.
pub fn route_for(source: &Path) -> String {
    let mut route = String::new();
    for component in source.with_extension("").components() {
        if let Component::Normal(part) = component {
            route.push('/');
            route.push_str(&part.to_string_lossy());
        }
    }
    if route.is_empty() { "/".to_string() } else { route }
}
