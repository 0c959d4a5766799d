use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context, Tera};

/// Name of the layout every document is rendered with.
pub const PAGE_TEMPLATE: &str = "page.html";

const BUILTIN_PAGE: &str = include_str!("../templates/page.html");

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    TeraError(#[from] tera::Error),
    #[error("IO error writing {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tera wrapper holding the theme's templates plus a context shared by
/// every render.
pub struct TemplateRenderer {
    tera: Tera,
    context: Context,
}

impl TemplateRenderer {
    /// Load `*.html` templates from `theme_dir`. Templates the theme doesn't
    /// provide fall back to the built-in layout.
    pub fn new(theme_dir: &Path) -> Result<Self, TemplateError> {
        let mut builtin = Tera::default();
        builtin.add_raw_template(PAGE_TEMPLATE, BUILTIN_PAGE)?;

        let mut tera = if theme_dir.is_dir() {
            let glob = format!("{}/**/*.html", theme_dir.display());
            let mut theme = Tera::new(&glob)?;
            theme.extend(&builtin)?;
            tracing::info!(theme = %theme_dir.display(), "Loaded theme templates");
            theme
        } else {
            tracing::debug!(theme = %theme_dir.display(), "No theme directory, using built-in layout");
            builtin
        };
        tera.set_escape_fn(escape_html);

        Ok(Self {
            tera,
            context: Context::new(),
        })
    }

    /// Add a value visible to every template render
    pub fn add_to_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.context.insert(key, value);
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render `template` with the shared context overlaid by `context`.
    pub fn render_with_context(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        let mut merged = self.context.clone();
        merged.extend(context.clone());
        Ok(self.tera.render(template, &merged)?)
    }

    /// Render a template with an external context and write to file
    pub fn render_to_file_with_context(
        &self,
        template: &str,
        context: &Context,
        output_path: &Path,
    ) -> Result<(), TemplateError> {
        let rendered = self.render_with_context(template, context)?;
        let io_err = |source| TemplateError::IoError {
            path: output_path.to_path_buf(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        std::fs::write(output_path, rendered).map_err(io_err)?;
        Ok(())
    }
}

// Tera's default escaper also encodes `/`, keep links readable.
fn escape_html(input: &str) -> String {
    html_escape::encode_quoted_attribute(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_context(content: &str) -> Context {
        let mut context = Context::new();
        context.insert("page", &serde_json::json!({ "title": "Button", "description": "", "path": "/content/button" }));
        context.insert("page_content", content);
        context.insert("on_this_page", &Vec::<String>::new());
        context.insert("previous", &Option::<String>::None);
        context.insert("next", &Option::<String>::None);
        context
    }

    fn renderer(theme_dir: &Path) -> TemplateRenderer {
        let mut renderer = TemplateRenderer::new(theme_dir).unwrap();
        renderer.add_to_context("site", &serde_json::json!({ "title": "Docs", "description": null }));
        renderer.add_to_context("navigation", &serde_json::json!({ "groups": [] }));
        renderer.add_to_context("live_reload", &Option::<String>::None);
        renderer
    }

    #[test]
    fn test_builtin_layout_without_theme() {
        let renderer = renderer(Path::new("/no/such/theme"));
        assert!(renderer.has_template(PAGE_TEMPLATE));

        let html = renderer
            .render_with_context(PAGE_TEMPLATE, &page_context("<p>hello</p>"))
            .unwrap();
        assert!(html.contains("<title>Button | Docs</title>"));
        assert!(html.contains("<p>hello</p>"));
        assert!(!html.contains("WebSocket"));
    }

    #[test]
    fn test_escaping_keeps_slashes() {
        assert_eq!(escape_html("/content/a/<b>"), "/content/a/&lt;b&gt;");
    }

    #[test]
    fn test_theme_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "THEME {{ page.title }}").unwrap();

        let html = renderer(dir.path())
            .render_with_context(PAGE_TEMPLATE, &page_context(""))
            .unwrap();
        assert_eq!(html, "THEME Button");
    }

    #[test]
    fn test_render_to_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a/b/index.html");

        renderer(Path::new("/no/such/theme"))
            .render_to_file_with_context(PAGE_TEMPLATE, &page_context("x"), &out)
            .unwrap();
        assert!(out.is_file());
    }
}
