//! Site orchestrator: every page through the pipeline, in parallel, then one merge.
//!
//! Pages are rendered on a bounded rayon pool sized by
//! [`effective_threads`](crate::config::effective_threads). Each page's
//! [`PageOutput`] is independent; the only shared mutable state is the
//! [`ResourceSet`], which is folded on the calling thread after all pages are
//! done, in page order. That makes the result (including which contributor a
//! conflict names first) independent of which worker finished first.
//!
//! ## Failure levels
//!
//! | Level | Example | Effect |
//! |-------|---------|--------|
//! | build | resource root missing | `generate()` returns `Err` |
//! | page | inline file missing | page contributes nothing, error collected |
//! | asset | linked image missing | asset omitted, error collected |
//! | path | two pages, same path, different bytes | per [`ConflictPolicy`] |

use crate::config::{BuildConfig, ConfigError, SiteConfig, effective_threads, load_config};
use crate::filter::{Filter, PageError, standard_filters};
use crate::page::Page;
use crate::pages::site_pages;
use crate::pipeline::{PageOutput, render_page};
use crate::posts::{PostError, load_posts};
use crate::resource::{ConflictPolicy, Resource, ResourceConflict, ResourceSet};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Build aborted on resource conflict: {0}")]
    Conflict(ResourceConflict),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Posts error: {0}")]
    Posts(PostError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<PostError> for SiteError {
    fn from(e: PostError) -> Self {
        match e {
            PostError::DirectoryNotFound(path) => SiteError::DirectoryNotFound(path),
            other => SiteError::Posts(other),
        }
    }
}

/// Result of one `generate()` call.
#[derive(Debug, Default)]
pub struct BuildOutput {
    /// Merged resources, sorted by path, one per path.
    pub resources: Vec<Resource>,
    /// Page- and asset-level problems, in page order.
    pub page_errors: Vec<PageError>,
    /// Path collisions with differing bytes, in the order they were found.
    pub conflicts: Vec<ResourceConflict>,
    /// Labels of pages whose pipeline stopped early.
    pub aborted_pages: Vec<String>,
    pub page_count: usize,
}

impl BuildOutput {
    /// Bytes of the resource at a `/`-separated path.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.resources
            .iter()
            .find(|r| r.path_string() == path)
            .map(|r| r.bytes.as_slice())
    }

    pub fn is_clean(&self) -> bool {
        self.page_errors.is_empty() && self.conflicts.is_empty()
    }
}

/// Pages plus the filter chain they run through. Built once per invocation.
pub struct Site {
    base_dir: PathBuf,
    resource_dir: PathBuf,
    pages: Vec<Page>,
    filters: Vec<Box<dyn Filter>>,
    policy: ConflictPolicy,
    threads: usize,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|filter| filter.name()).collect();
        f.debug_struct("Site")
            .field("base_dir", &self.base_dir)
            .field("resource_dir", &self.resource_dir)
            .field("pages", &self.pages.len())
            .field("filters", &filters)
            .field("policy", &self.policy)
            .field("threads", &self.threads)
            .finish()
    }
}

impl Site {
    /// A site with explicit pages and filters; resources are read from
    /// `<base>/Resources` unless [`with_resource_dir`](Self::with_resource_dir) says otherwise.
    pub fn new(base_dir: impl Into<PathBuf>, pages: Vec<Page>, filters: Vec<Box<dyn Filter>>) -> Self {
        let base_dir = base_dir.into();
        Self {
            resource_dir: base_dir.join("Resources"),
            base_dir,
            pages,
            filters,
            policy: ConflictPolicy::default(),
            threads: effective_threads(&BuildConfig::default()),
        }
    }

    /// The blog: `config.toml` from `base_dir`, posts, the standard page set
    /// and the standard filter chain.
    pub fn load(base_dir: &Path) -> Result<(Self, SiteConfig), SiteError> {
        if !base_dir.is_dir() {
            return Err(SiteError::DirectoryNotFound(base_dir.to_path_buf()));
        }
        let config = load_config(base_dir)?;
        let site = Self::from_config(base_dir, &config)?;
        Ok((site, config))
    }

    pub fn from_config(base_dir: &Path, config: &SiteConfig) -> Result<Self, SiteError> {
        let posts = load_posts(&config.paths.posts_dir(base_dir))?;
        let resource_dir = config.paths.resources_dir(base_dir);
        let filters = standard_filters(&resource_dir, config);
        Ok(Self::new(base_dir, site_pages(config, posts), filters)
            .with_resource_dir(resource_dir)
            .with_policy(config.build.conflict_policy)
            .with_threads(effective_threads(&config.build)))
    }

    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = dir.into();
        self
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn filters(&self) -> &[Box<dyn Filter>] {
        &self.filters
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Render every page and merge the results.
    pub fn generate(&self) -> Result<BuildOutput, SiteError> {
        for dir in [&self.base_dir, &self.resource_dir] {
            if !dir.is_dir() {
                return Err(SiteError::DirectoryNotFound(dir.clone()));
            }
        }

        info!(
            pages = self.pages.len(),
            threads = self.threads,
            policy = %self.policy,
            "generating site"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;
        let outputs: Vec<PageOutput> = pool.install(|| {
            self.pages
                .par_iter()
                .map(|page| render_page(page, &self.filters))
                .collect()
        });

        let output = self.merge(outputs)?;
        info!(
            resources = output.resources.len(),
            page_errors = output.page_errors.len(),
            conflicts = output.conflicts.len(),
            "site generated"
        );
        Ok(output)
    }

    /// Fold page outputs into one resource set, in page order.
    fn merge(&self, outputs: Vec<PageOutput>) -> Result<BuildOutput, SiteError> {
        let mut set = ResourceSet::new(self.policy);
        let mut output = BuildOutput {
            page_count: outputs.len(),
            ..BuildOutput::default()
        };

        for page in outputs {
            debug!(page = %page.label, resources = page.resources.len(), errors = page.errors.len(), "merging page");
            if page.aborted {
                output.aborted_pages.push(page.label.clone());
            }
            output.page_errors.extend(page.errors);
            for resource in page.resources {
                let Some(conflict) = set.insert(resource, &page.label) else {
                    continue;
                };
                warn!(%conflict, policy = %self.policy, "resource conflict");
                if self.policy == ConflictPolicy::Abort {
                    return Err(SiteError::Conflict(conflict));
                }
                output.conflicts.push(conflict);
            }
        }

        output.resources = set.into_resources();
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, el};
    use crate::page::{Layout, Route};
    use crate::test_helpers::{resource_root, site_base};
    use tempfile::TempDir;

    fn page(route: &[&str], title: &str, body: &'static str) -> Page {
        let route = Route::new(route.iter().copied());
        Page::new(route, title, Layout::Empty, move || el("p").child(body).into())
    }

    fn site(tmp: &TempDir, pages: Vec<Page>) -> Site {
        let filters = standard_filters(&tmp.path().join("Resources"), &SiteConfig::default());
        Site::new(tmp.path(), pages, filters)
    }

    #[test]
    fn missing_resource_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = site(&tmp, vec![page(&["a"], "A", "a")]).generate().unwrap_err();
        assert!(matches!(err, SiteError::DirectoryNotFound(p) if p.ends_with("Resources")));
    }

    #[test]
    fn pages_render_to_sorted_resources() {
        let tmp = resource_root(&[]);
        let out = site(&tmp, vec![page(&["b"], "B", "b"), page(&["a"], "A", "a")])
            .generate()
            .unwrap();
        let paths: Vec<_> = out.resources.iter().map(|r| r.path_string()).collect();
        assert_eq!(paths, vec!["a/index.html", "b/index.html"]);
        assert_eq!(out.get("a/index.html"), Some(&b"<p>a</p>"[..]));
        assert!(out.is_clean());
        assert_eq!(out.page_count, 2);
    }

    #[test]
    fn same_route_different_bytes_is_conflict() {
        let tmp = resource_root(&[]);
        let out = site(&tmp, vec![page(&["x"], "One", "1"), page(&["x"], "Two", "2")])
            .generate()
            .unwrap();
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].first_page, "One (/x/)");
        assert_eq!(out.conflicts[0].second_page, "Two (/x/)");
        assert!(out.get("x/index.html").is_none());
    }

    #[test]
    fn keep_first_policy_keeps_first_page() {
        let tmp = resource_root(&[]);
        let out = site(&tmp, vec![page(&["x"], "One", "1"), page(&["x"], "Two", "2")])
            .with_policy(ConflictPolicy::KeepFirst)
            .generate()
            .unwrap();
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.get("x/index.html"), Some(&b"<p>1</p>"[..]));
    }

    #[test]
    fn abort_policy_fails_build() {
        let tmp = resource_root(&[]);
        let err = site(&tmp, vec![page(&["x"], "One", "1"), page(&["x"], "Two", "2")])
            .with_policy(ConflictPolicy::Abort)
            .generate()
            .unwrap_err();
        assert!(matches!(err, SiteError::Conflict(c) if c.path == "x/index.html"));
    }

    #[test]
    fn page_failure_does_not_stop_others() {
        let tmp = resource_root(&[]);
        let broken = Page::new(Route::new(["broken"]), "Broken", Layout::Empty, || {
            Node::inline("css/missing.css")
        });
        let out = site(&tmp, vec![broken, page(&["ok"], "Ok", "fine")])
            .with_threads(2)
            .generate()
            .unwrap();
        assert_eq!(out.aborted_pages, vec!["Broken (/broken/)"]);
        assert!(matches!(out.page_errors[0], PageError::MissingInlineFile { .. }));
        assert!(out.get("ok/index.html").is_some());
        assert!(out.get("broken/index.html").is_none());
    }

    #[test]
    fn load_builds_blog_from_base_dir() {
        let tmp = site_base();
        let (site, config) = Site::load(tmp.path()).unwrap();
        assert_eq!(config.paths.output, "Site");
        assert!(site.pages().iter().any(|p| p.route == Route::new(["about"])));

        let out = site.generate().unwrap();
        assert!(out.is_clean(), "{:?} {:?}", out.page_errors, out.conflicts);
        assert!(out.get("index.html").is_some());
        assert!(out.get("atom.xml").is_some());
        assert!(out.get("sitemap.xml").is_some());
    }

    #[test]
    fn load_without_posts_dir_is_fatal() {
        let tmp = resource_root(&[]);
        let err = Site::load(tmp.path()).unwrap_err();
        assert!(matches!(err, SiteError::DirectoryNotFound(p) if p.ends_with("Posts")));
    }
}
