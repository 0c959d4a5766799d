use std::path::Path;

use serde::Serialize;
use tera::Context;

use crate::document::Document;
use crate::markdown;
use crate::navigation::NavIndex;
use crate::template::{PAGE_TEMPLATE, TemplateError, TemplateRenderer};

/// Values specific to one page render.
#[derive(Default)]
pub struct RenderContext {
    context: Context,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.context.insert(key, value);
    }
}

pub struct Renderer {
    templates: TemplateRenderer,
}

impl Renderer {
    pub fn new(theme_dir: &Path) -> Result<Self, TemplateError> {
        Ok(Self {
            templates: TemplateRenderer::new(theme_dir)?,
        })
    }

    /// Context shared by every page, e.g. `site` and `navigation`.
    pub fn set_global_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.templates.add_to_context(key, value);
    }

    pub fn render(&self, template: &str, context: &RenderContext) -> Result<String, TemplateError> {
        self.templates.render_with_context(template, &context.context)
    }

    /// Full HTML page for `document`, with its sidebar neighbours and
    /// heading outline.
    pub fn render_document(&self, document: &Document, navigation: &NavIndex) -> Result<String, TemplateError> {
        let mut context = RenderContext::new();

        context.add_to_context("page", &document.summary());
        context.add_to_context("page_content", &markdown::render_html(&document.body));

        let on_this_page: Vec<markdown::Heading> = markdown::headings(&document.body)
            .into_iter()
            .filter(|h| h.level >= 2)
            .collect();
        context.add_to_context("on_this_page", &on_this_page);

        let (previous, next) = navigation.neighbors(&document.path);
        context.add_to_context("previous", &previous);
        context.add_to_context("next", &next);

        self.render(PAGE_TEMPLATE, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentStore;

    fn renderer() -> Renderer {
        let mut renderer = Renderer::new(Path::new("/no/such/theme")).unwrap();
        renderer.set_global_context("site", &crate::config::SiteConfig::default());
        renderer.set_global_context("live_reload", &Option::<String>::None);
        renderer
    }

    #[test]
    fn test_render_document_includes_navigation() {
        let store = ContentStore::new(vec![
            Document::parse("content/a.md", "---\ntitle: Alpha\ncategory: components\norder: 1\n---\n# Alpha\n\n## Props\n").unwrap(),
            Document::parse("content/b.md", "---\ntitle: Beta\ncategory: components\norder: 2\n---\n# Beta\n").unwrap(),
        ]);
        let navigation = NavIndex::build(&store, &[]);
        let mut renderer = renderer();
        renderer.set_global_context("navigation", &navigation);

        let html = renderer.render_document(store.get("/content/a").unwrap(), &navigation).unwrap();

        assert!(html.contains("<h2>components</h2>"));
        assert!(html.contains("<a href=\"/content/a/\" class=\"active\">Alpha</a>"));
        assert!(html.contains("<a href=\"/content/b/\">Beta &rarr;</a>"));
        assert!(html.contains("<a href=\"#props\">Props</a>"));
        assert!(html.contains("<h2 id=\"props\">Props</h2>"));
    }
}
