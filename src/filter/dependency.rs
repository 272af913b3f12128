//! Stage 4: record which local files the page refers to.
//!
//! Scans `src`, `href`, and `poster` attributes. A value is a dependency when
//! it is a relative reference that stays inside the resource root once `.` and
//! `..` are resolved. The normalised, source-relative path is recorded on the
//! [`PageContext`]; nothing is read from disk and the tree is returned unchanged.

use super::{Filter, FilterError, FilterOutput, PageContext};
use crate::node::Node;

const REFERENCE_ATTRIBUTES: &[&str] = &["src", "href", "poster"];

/// Normalise a reference to a source-relative path, or `None` when it is not a
/// local file dependency.
///
/// ```
/// use inkpress::filter::resolve_reference;
///
/// assert_eq!(resolve_reference("./img/logo.png").as_deref(), Some("img/logo.png"));
/// assert_eq!(resolve_reference("https://example.com/a.png"), None);
/// assert_eq!(resolve_reference("/about/"), None);
/// ```
pub fn resolve_reference(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || value.starts_with('/') {
        return None;
    }
    if has_scheme(value) {
        return None;
    }

    let path = value.split(['?', '#']).next().unwrap_or_default();
    if path.ends_with('/') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// `mailto:`, `https:`, `data:` and friends: a scheme is letters, digits, `+`,
/// `-`, `.` before the first `:`, starting with a letter, with no `/` ahead of it.
fn has_scheme(value: &str) -> bool {
    let Some(colon) = value.find(':') else {
        return false;
    };
    let scheme = &value[..colon];
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub struct DependencyFilter;

impl Filter for DependencyFilter {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        tree.walk(&mut |e| {
            for (key, value) in &e.attributes {
                if !REFERENCE_ATTRIBUTES.contains(&key.as_str()) {
                    continue;
                }
                if let Some(path) = resolve_reference(value) {
                    ctx.add_dependency(path);
                }
            }
        });
        Ok(FilterOutput::tree(tree))
    }
}
