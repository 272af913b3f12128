//! Stage 1: splice files from the resource root into the tree.
//!
//! Two forms are resolved:
//!
//! - an `x-inline src="css/base.css"` placeholder element anywhere in the tree,
//!   replaced by a `raw` node holding the file's text
//! - a `{{inline:path}}` directive inside markdown source text, replaced by the
//!   file's text so the markdown stage parses it together with its surroundings
//!
//! Expansion is single-pass: inlined text is not scanned for further directives.

use super::{Filter, FilterError, FilterOutput, PageContext, PageError};
use crate::node::{INLINE_TAG, MARKDOWN_TAG, Node, Visit};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

const DIRECTIVE_OPEN: &str = "{{inline:";
const DIRECTIVE_CLOSE: &str = "}}";

pub struct InlineFilter {
    root: PathBuf,
    /// Text of files already read, keyed by source-relative path.
    cache: Mutex<HashMap<String, Arc<str>>>,
}

impl InlineFilter {
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        Self {
            root: resource_root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read `path` relative to the resource root, through the cache.
    fn load(&self, path: &str, ctx: &PageContext) -> Result<Arc<str>, FilterError> {
        if let Some(hit) = self.cached(path) {
            return Ok(hit);
        }

        let missing = || {
            FilterError::Page(PageError::MissingInlineFile {
                page: ctx.label.clone(),
                path: path.to_string(),
            })
        };
        let full = self.resolve(path).ok_or_else(missing)?;
        let bytes = match std::fs::read(&full) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(missing()),
            Err(e) if full.is_dir() => {
                debug!(path, error = %e, "inline target is a directory");
                return Err(missing());
            }
            Err(source) => {
                return Err(FilterError::Io {
                    path: path.to_string(),
                    source,
                });
            }
        };
        let text: Arc<str> = String::from_utf8_lossy(&bytes).into();
        debug!(path, bytes = bytes.len(), "inlined file");

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), Arc::clone(&text));
        Ok(text)
    }

    fn cached(&self, path: &str) -> Option<Arc<str>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Join a source-relative path onto the root, refusing anything that climbs out.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path);
        let mut out = self.root.clone();
        for component in rel.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(out)
    }

    /// Resolve placeholders and directives inside a markdown payload.
    fn expand_markdown(&self, node: Node, ctx: &PageContext) -> Result<Node, FilterError> {
        match node {
            Node::Text(text) => Ok(Node::Text(self.expand_directives(&text, ctx)?)),
            Node::Element(e) if e.name == INLINE_TAG => self.placeholder(e.get_attr("src"), ctx),
            Node::Element(mut e) => {
                e.children = e
                    .children
                    .into_iter()
                    .map(|c| self.expand_markdown(c, ctx))
                    .collect::<Result<_, _>>()?;
                Ok(Node::Element(e))
            }
            Node::Fragment(nodes) => Ok(Node::Fragment(
                nodes
                    .into_iter()
                    .map(|c| self.expand_markdown(c, ctx))
                    .collect::<Result<_, _>>()?,
            )),
            other => Ok(other),
        }
    }

    fn expand_directives(&self, text: &str, ctx: &PageContext) -> Result<String, FilterError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(DIRECTIVE_OPEN) {
            let after = &rest[start + DIRECTIVE_OPEN.len()..];
            let Some(end) = after.find(DIRECTIVE_CLOSE) else {
                break;
            };
            out.push_str(&rest[..start]);
            out.push_str(&self.load(after[..end].trim(), ctx)?);
            rest = &after[end + DIRECTIVE_CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn placeholder(&self, src: Option<&str>, ctx: &PageContext) -> Result<Node, FilterError> {
        let path = src.unwrap_or_default();
        Ok(Node::raw(&*self.load(path, ctx)?))
    }
}

impl Filter for InlineFilter {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        let ctx = &*ctx;
        let tree = tree.try_rewrite(&mut |e| {
            if e.name == INLINE_TAG {
                self.placeholder(e.get_attr("src"), ctx).map(Visit::Replace)
            } else if e.name == MARKDOWN_TAG {
                self.expand_markdown(Node::Element(e), ctx).map(Visit::Replace)
            } else {
                Ok(Visit::Descend(e))
            }
        })?;
        Ok(FilterOutput::tree(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::el;
    use crate::page::Route;
    use std::fs;
    use tempfile::TempDir;

    fn root_with(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        tmp
    }

    fn ctx() -> PageContext {
        PageContext::new(Route::new(["t"]), "T (/t/)")
    }

    #[test]
    fn placeholder_becomes_raw() {
        let tmp = root_with(&[("css/base.css", "body { color: red; }")]);
        let filter = InlineFilter::new(tmp.path());
        let tree: Node = el("style").child(Node::inline("css/base.css")).into();

        let out = filter.apply(tree, &mut ctx()).unwrap();
        assert_eq!(
            out.tree,
            el("style").child(Node::raw("body { color: red; }")).into()
        );
        assert!(out.resources.is_empty());
    }

    #[test]
    fn directive_in_markdown_is_expanded_as_text() {
        let tmp = root_with(&[("snippet.md", "**there**")]);
        let filter = InlineFilter::new(tmp.path());
        let tree = Node::markdown("# Hi {{inline:snippet.md}}");

        let out = filter.apply(tree, &mut ctx()).unwrap();
        assert_eq!(out.tree, Node::markdown("# Hi **there**"));
    }

    #[test]
    fn placeholder_inside_markdown_is_resolved() {
        let tmp = root_with(&[("md/about.md", "# About")]);
        let filter = InlineFilter::new(tmp.path());
        let tree = Node::markdown_of([Node::inline("md/about.md")]);

        let out = filter.apply(tree, &mut ctx()).unwrap();
        assert_eq!(out.tree.text_content(), "# About");
    }

    #[test]
    fn directives_outside_markdown_are_left_alone() {
        let tmp = root_with(&[("snippet.md", "x")]);
        let filter = InlineFilter::new(tmp.path());
        let tree: Node = el("p").child("{{inline:snippet.md}}").into();

        let out = filter.apply(tree.clone(), &mut ctx()).unwrap();
        assert_eq!(out.tree, tree);
    }

    #[test]
    fn unterminated_directive_is_kept_verbatim() {
        let tmp = root_with(&[]);
        let filter = InlineFilter::new(tmp.path());
        let out = filter
            .apply(Node::markdown("a {{inline:oops"), &mut ctx())
            .unwrap();
        assert_eq!(out.tree, Node::markdown("a {{inline:oops"));
    }

    #[test]
    fn missing_file_is_page_error() {
        let tmp = root_with(&[]);
        let filter = InlineFilter::new(tmp.path());
        let err = filter
            .apply(Node::inline("css/missing.css"), &mut ctx())
            .unwrap_err();
        assert!(matches!(
            err,
            FilterError::Page(PageError::MissingInlineFile { ref path, .. }) if path == "css/missing.css"
        ));
    }

    #[test]
    fn parent_traversal_is_refused() {
        let tmp = root_with(&[("inner/ok.css", "x")]);
        let filter = InlineFilter::new(tmp.path().join("inner"));
        fs::write(tmp.path().join("secret.txt"), "s").unwrap();

        let err = filter
            .apply(Node::inline("../secret.txt"), &mut ctx())
            .unwrap_err();
        assert!(matches!(
            err,
            FilterError::Page(PageError::MissingInlineFile { .. })
        ));
    }

    #[test]
    fn repeated_reads_come_from_cache() {
        let tmp = root_with(&[("a.css", "one")]);
        let filter = InlineFilter::new(tmp.path());
        filter.apply(Node::inline("a.css"), &mut ctx()).unwrap();

        // Changing the file mid-build must not change what pages see.
        fs::write(tmp.path().join("a.css"), "two").unwrap();
        let out = filter.apply(Node::inline("a.css"), &mut ctx()).unwrap();
        assert_eq!(out.tree, Node::raw("one"));
    }

    #[test]
    fn cache_survives_a_poisoned_lock() {
        let tmp = root_with(&[("a.css", "one")]);
        let filter = InlineFilter::new(tmp.path());
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = filter.cache.lock().unwrap();
            panic!("worker died holding the cache");
        }));
        assert!(filter.cache.is_poisoned());

        filter.apply(Node::inline("a.css"), &mut ctx()).unwrap();
        fs::write(tmp.path().join("a.css"), "two").unwrap();
        let out = filter.apply(Node::inline("a.css"), &mut ctx()).unwrap();
        assert_eq!(out.tree, Node::raw("one"));
    }
}
