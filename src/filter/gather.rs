//! Stage 5: copy each recorded dependency into the output as a resource.
//!
//! The output path equals the source-relative path, so `./img/logo.png` on any
//! page becomes `img/logo.png` in the site. A dependency that does not exist is
//! recorded as [`PageError::UnresolvedDependency`] and the page carries on.

use super::{Filter, FilterError, FilterOutput, PageContext, PageError};
use crate::node::Node;
use crate::resource::Resource;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct GatherFilter {
    root: PathBuf,
}

impl GatherFilter {
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        Self {
            root: resource_root.into(),
        }
    }
}

impl Filter for GatherFilter {
    fn name(&self) -> &'static str {
        "gather"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        let mut resources = Vec::with_capacity(ctx.dependencies.len());
        let mut unresolved = Vec::new();

        for dep in &ctx.dependencies {
            let full = self.root.join(dep);
            match std::fs::read(&full) {
                Ok(bytes) => {
                    debug!(page = %ctx.label, path = %dep, bytes = bytes.len(), "gathered dependency");
                    resources.push(Resource::at(dep, bytes));
                }
                Err(e) if e.kind() == ErrorKind::NotFound || full.is_dir() => {
                    warn!(page = %ctx.label, path = %dep, "dependency not found");
                    unresolved.push(PageError::UnresolvedDependency {
                        page: ctx.label.clone(),
                        path: dep.clone(),
                    });
                }
                Err(source) => {
                    return Err(FilterError::Io {
                        path: dep.clone(),
                        source,
                    });
                }
            }
        }

        ctx.diagnostics.extend(unresolved);
        Ok(FilterOutput { tree, resources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Route;
    use std::fs;
    use tempfile::TempDir;

    fn ctx_with(deps: &[&str]) -> PageContext {
        let mut ctx = PageContext::new(Route::new(["t"]), "T (/t/)");
        for d in deps {
            ctx.add_dependency(d.to_string());
        }
        ctx
    }

    #[test]
    fn existing_dependency_becomes_resource() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img")).unwrap();
        fs::write(tmp.path().join("img/logo.png"), b"\x89PNG").unwrap();

        let mut ctx = ctx_with(&["img/logo.png"]);
        let out = GatherFilter::new(tmp.path())
            .apply(Node::empty(), &mut ctx)
            .unwrap();

        assert_eq!(out.resources, vec![Resource::at("img/logo.png", &b"\x89PNG"[..])]);
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn missing_dependency_is_recorded_and_page_continues() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("present.css"), "a{}").unwrap();

        let mut ctx = ctx_with(&["missing.png", "present.css"]);
        let out = GatherFilter::new(tmp.path())
            .apply(Node::text("kept"), &mut ctx)
            .unwrap();

        assert_eq!(out.tree, Node::text("kept"));
        assert_eq!(out.resources.len(), 1);
        assert_eq!(
            ctx.diagnostics,
            vec![PageError::UnresolvedDependency {
                page: "T (/t/)".into(),
                path: "missing.png".into(),
            }]
        );
    }

    #[test]
    fn directory_dependency_is_unresolved() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img")).unwrap();

        let mut ctx = ctx_with(&["img"]);
        let out = GatherFilter::new(tmp.path())
            .apply(Node::empty(), &mut ctx)
            .unwrap();
        assert!(out.resources.is_empty());
        assert_eq!(ctx.diagnostics.len(), 1);
    }
}
