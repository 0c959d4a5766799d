//! Front-matter metadata blocks.
//!
//! A document may start with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Button
//! category: components
//! order: 2
//! ---
//! # Button
//! ```
//!
//! The four known keys get typed accessors with defaults; anything else is
//! kept in [`FrontMatter::extra`] so it can be handed to templates untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Category assigned to documents that don't declare one.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

const DELIMITER: &str = "---";
const ALT_CLOSING_DELIMITER: &str = "...";

#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    #[error("front matter block opened on line 1 is never closed")]
    Unterminated,
    #[error("front matter is not a key-value mapping: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Known keys are doubly optional: the outer `Option` records whether the key
/// was written at all, the inner one whether it had a value (`title:` or
/// `title: ~` parse as `Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub order: Option<Option<i64>>,
    /// Keys without a dedicated field, in source order-independent form.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Only called for keys that appear in the block, so a null value still
/// marks the key as present.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl FrontMatter {
    pub fn title(&self) -> &str {
        self.title.as_ref().and_then(Option::as_deref).unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_ref().and_then(Option::as_deref).unwrap_or_default()
    }

    pub fn category(&self) -> &str {
        match self.category.as_ref().and_then(Option::as_deref) {
            Some(c) if !c.trim().is_empty() => c,
            _ => DEFAULT_CATEGORY,
        }
    }

    pub fn order(&self) -> i64 {
        self.order.flatten().unwrap_or(0)
    }

    /// Serialize back into the YAML that sits between the delimiters.
    /// Keys that were absent when parsing stay absent.
    pub fn to_yaml(&self) -> Result<String, FrontMatterError> {
        if self.is_empty() {
            return Ok(String::new());
        }
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.order.is_none()
            && self.extra.is_empty()
    }

    fn from_yaml(block: &str) -> Result<Self, FrontMatterError> {
        if block.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(block)?)
    }
}

/// Split `text` into its metadata and the untouched body that follows it.
///
/// Text that doesn't open with a `---` line has no metadata block; the whole
/// input is returned as the body alongside default metadata.
pub fn parse(text: &str) -> Result<(FrontMatter, &str), FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(after_open) = strip_delimiter_line(text, DELIMITER) else {
        return Ok((FrontMatter::default(), text));
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == DELIMITER || trimmed == ALT_CLOSING_DELIMITER {
            let block = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Ok((FrontMatter::from_yaml(block)?, body));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

/// Render metadata and body back into a single document.
pub fn render(meta: &FrontMatter, body: &str) -> Result<String, FrontMatterError> {
    let yaml = meta.to_yaml()?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

fn strip_delimiter_line<'a>(text: &'a str, delimiter: &str) -> Option<&'a str> {
    let (first, rest) = match text.find('\n') {
        Some(idx) => (&text[..idx], &text[idx + 1..]),
        None => (text, ""),
    };
    (first.trim_end() == delimiter).then_some(rest)
}
