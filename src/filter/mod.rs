//! The filter interface and the six stages of the content pipeline.
//!
//! A [`Filter`] takes a page's document tree and returns a transformed tree
//! plus any extra [`Resource`]s it wants written. Filters hold only
//! configuration and immutable lookup tables; everything that varies per page
//! travels in the [`PageContext`].
//!
//! ## Stage order
//!
//! The order is part of correctness, later stages rely on shapes produced by
//! earlier ones:
//!
//! | # | Filter | Needs |
//! |---|--------|-------|
//! | 1 | [`InlineFilter`] | placeholders from pages and layouts |
//! | 2 | [`MarkdownFilter`] | markdown text, including text spliced in by 1 |
//! | 3 | [`HighlightFilter`] | `pre > code.language-*` produced by 2 |
//! | 4 | [`DependencyFilter`] | final `src`/`href` attributes |
//! | 5 | [`GatherFilter`] | dependencies recorded by 4 |
//! | 6 | [`EncodeFilter`] | the finished tree |
//!
//! [`standard_filters`] builds that list once per build.

mod dependency;
mod encode;
mod gather;
mod highlight;
mod inline;
mod markdown;

pub use dependency::{DependencyFilter, resolve_reference};
pub use encode::{EncodeFilter, encode_document, encode_html};
pub use gather::GatherFilter;
pub use highlight::{HighlightFilter, TokenClass, classify_scope};
pub use inline::InlineFilter;
pub use markdown::{MarkdownFilter, parse_markdown};

use crate::config::SiteConfig;
use crate::node::Node;
use crate::page::Route;
use crate::resource::Resource;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Per-page problems. Some abort the page (returned as `Err` from
/// [`Filter::apply`]); the rest are recorded in [`PageContext::diagnostics`]
/// while the page carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageError {
    #[error("{page}: inline file not found: {path}")]
    MissingInlineFile { page: String, path: String },
    #[error("{page}: markdown kept as source: {reason}")]
    MarkdownParseError { page: String, reason: String },
    #[error("{page}: dependency not found: {path}")]
    UnresolvedDependency { page: String, path: String },
    #[error("{page}: cannot read {path}: {reason}")]
    ReadFailed {
        page: String,
        path: String,
        reason: String,
    },
}

impl PageError {
    /// Label of the page the problem belongs to.
    pub fn page(&self) -> &str {
        match self {
            PageError::MissingInlineFile { page, .. }
            | PageError::MarkdownParseError { page, .. }
            | PageError::UnresolvedDependency { page, .. }
            | PageError::ReadFailed { page, .. } => page,
        }
    }
}

/// Failure that stops the rest of a page's filter chain.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FilterError {
    /// The page-level record of this failure, for reports.
    pub fn into_page_error(self, page: &str) -> PageError {
        match self {
            FilterError::Page(e) => e,
            FilterError::Io { path, source } => PageError::ReadFailed {
                page: page.to_string(),
                path,
                reason: source.to_string(),
            },
        }
    }
}

/// Mutable state of one page's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub route: Route,
    /// `Title (/route/)`, used in every report about this page.
    pub label: String,
    /// Source-relative asset paths, in discovery order, without duplicates.
    pub dependencies: Vec<String>,
    /// Recovered problems, in the order they were found.
    pub diagnostics: Vec<PageError>,
}

impl PageContext {
    pub fn new(route: Route, label: impl Into<String>) -> Self {
        Self {
            route,
            label: label.into(),
            dependencies: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn add_dependency(&mut self, path: String) {
        if !self.dependencies.contains(&path) {
            self.dependencies.push(path);
        }
    }
}

/// What a filter hands to the next stage.
#[derive(Debug)]
pub struct FilterOutput {
    pub tree: Node,
    pub resources: Vec<Resource>,
}

impl FilterOutput {
    /// The tree alone, no extra resources.
    pub fn tree(tree: Node) -> Self {
        Self {
            tree,
            resources: Vec::new(),
        }
    }
}

/// One pipeline stage.
///
/// Implementations are shared by reference across worker threads, so any
/// cache they keep must be behind a lock.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError>;
}

/// The six filters in pipeline order, configured for one build.
pub fn standard_filters(resource_root: &Path, config: &SiteConfig) -> Vec<Box<dyn Filter>> {
    vec![
        Box::new(InlineFilter::new(resource_root)),
        Box::new(MarkdownFilter::new(config.markdown.max_nesting)),
        Box::new(HighlightFilter::new(config.highlight.enabled)),
        Box::new(DependencyFilter),
        Box::new(GatherFilter::new(resource_root)),
        Box::new(EncodeFilter),
    ]
}
