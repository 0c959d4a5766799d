use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use serde::Serialize;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u32,
    pub text: String,
    pub slug: String,
}

/// Render a Markdown body to HTML.
///
/// Fenced code is highlighted with syntect and every heading gets an `id`
/// matching the slugs returned by [`headings`].
pub fn render_html(body: &str) -> String {
    let events: Vec<Event> = Parser::new_ext(body, Options::all()).collect();
    let mut processed = Vec::with_capacity(events.len());
    let mut slugs = SlugRegistry::default();
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.split_whitespace().next().unwrap_or_default().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                let mut code = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }
                processed.push(Event::Html(highlight_code(&code, &lang).into()));
            }
            Event::Start(Tag::Heading { level, id, .. }) => {
                let level = *level;
                let explicit_id = id.clone();
                let mut inner = Vec::new();
                i += 1;
                while i < events.len() {
                    if let Event::End(TagEnd::Heading(_)) = &events[i] {
                        break;
                    }
                    inner.push(events[i].clone());
                    i += 1;
                }
                let text = plain_text(&inner);
                let slug = match explicit_id {
                    Some(id) => slugs.claim(id.to_string()),
                    None => slugs.claim(slugify(&text)),
                };
                let mut inner_html = String::new();
                html::push_html(&mut inner_html, inner.into_iter());
                let n = heading_number(level);
                processed.push(Event::Html(CowStr::from(format!(
                    "<h{n} id=\"{}\">{inner_html}</h{n}>\n",
                    html_escape::encode_double_quoted_attribute(&slug)
                ))));
            }
            event => processed.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed.into_iter());
    out
}

/// Every heading in the body, in document order, with the slug
/// [`render_html`] assigns to it.
pub fn headings(body: &str) -> Vec<Heading> {
    let mut slugs = SlugRegistry::default();
    let mut result = Vec::new();
    let mut current: Option<(u32, Option<String>, Vec<Event>)> = None;

    for event in Parser::new_ext(body, Options::all()) {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some((heading_number(level), id.map(|i| i.to_string()), Vec::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, id, inner)) = current.take() {
                    let text = plain_text(&inner);
                    let slug = slugs.claim(id.unwrap_or_else(|| slugify(&text)));
                    result.push(Heading { level, text, slug });
                }
            }
            other => {
                if let Some((_, _, inner)) = current.as_mut() {
                    inner.push(other);
                }
            }
        }
    }

    result
}

/// Text of the first level-1 heading, used as a title fallback.
pub fn first_title(body: &str) -> Option<String> {
    headings(body)
        .into_iter()
        .find(|h| h.level == 1)
        .map(|h| h.text)
        .filter(|t| !t.trim().is_empty())
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    if slug.is_empty() { "section".to_string() } else { slug }
}

fn highlight_code(code: &str, lang: &str) -> String {
    let fallback = || format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code));
    if lang.is_empty() {
        return fallback();
    }

    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| match lang {
        // Common doc languages syntect doesn't ship grammars for
        "vue" | "svelte" => SYNTAX_SET.find_syntax_by_name("HTML"),
        "ts" | "typescript" | "tsx" | "jsx" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
        "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
        "scss" => SYNTAX_SET.find_syntax_by_name("CSS"),
        _ => None,
    });

    match (syntax, THEME_SET.themes.get(HIGHLIGHT_THEME)) {
        (Some(syntax), Some(theme)) => {
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| fallback())
        }
        _ => fallback(),
    }
}

fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn heading_number(level: HeadingLevel) -> u32 {
    level as u32
}

/// Hands out unique anchors, suffixing repeats with `-1`, `-2`, ...
#[derive(Default)]
struct SlugRegistry {
    seen: HashMap<String, usize>,
}

impl SlugRegistry {
    fn claim(&mut self, slug: String) -> String {
        let count = self.seen.entry(slug.clone()).or_insert(0);
        let unique = if *count == 0 { slug } else { format!("{slug}-{count}") };
        *count += 1;
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  Props & Events "), "props-events");
        assert_eq!(slugify("v-model_binding"), "v-model-binding");
        assert_eq!(slugify("!!!"), "section");
    }

    #[test]
    fn test_headings_are_unique() {
        let body = "# Button\n\n## Props\n\n## Events\n\n### Props\n\n## Props\n";
        let slugs: Vec<String> = headings(body).into_iter().map(|h| h.slug).collect();
        assert_eq!(slugs, vec!["button", "props", "events", "props-1", "props-2"]);
    }

    #[test]
    fn test_render_assigns_heading_ids() {
        let html = render_html("## Theme `colors`\n\nText");
        assert!(html.contains("<h2 id=\"theme-colors\">Theme <code>colors</code></h2>"));
        assert!(html.contains("<p>Text</p>"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain_block() {
        let html = render_html("```nosuchlang\n<b>x</b>\n```\n");
        assert!(html.contains("<pre><code>&lt;b&gt;x&lt;/b&gt;\n</code></pre>"));
    }

    #[test]
    fn test_known_language_is_highlighted() {
        let html = render_html("```rust\nfn main() {}\n```\n");
        assert!(html.contains("<pre style="));
    }

    #[test]
    fn test_first_title() {
        assert_eq!(first_title("intro\n\n# Colors\n\n# Later"), Some("Colors".to_string()));
        assert_eq!(first_title("## Only h2"), None);
    }
}
