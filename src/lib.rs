//! # Inkpress
//!
//! A static site generator for a single-author blog. Posts are markdown files
//! named `YYYY-MM-DD-slug.md`; stylesheets, markdown fragments and images live
//! in a resource directory; every build regenerates the whole site.
//!
//! # Architecture: Filter Pipeline
//!
//! Each page is a route plus a function producing a document tree. The tree
//! goes through six filters in a fixed order, then all pages' outputs are
//! merged into one set of files:
//!
//! ```text
//!            ┌──────── per page, in parallel ────────┐
//! Page ──▶ inline ─▶ markdown ─▶ highlight ─▶ dependency ─▶ gather ─▶ encode
//!            └──────────────────┬────────────────────┘
//!                               ▼
//!                  ResourceSet (dedupe + conflicts) ──▶ writer
//! ```
//!
//! The tree is never serialized until the last stage, so earlier stages work
//! on structure rather than strings. Pages share nothing mutable; the merge is
//! the one place their results meet.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`node`] | Document tree: element, text, raw, fragment, doctype |
//! | [`resource`] | Output files and the deduplicating, conflict-detecting merge |
//! | [`page`] | Routes, layouts, and the `Page` value |
//! | [`filter`] | The `Filter` trait and the six stages |
//! | [`pipeline`] | One page through the filter chain |
//! | [`site`] | Parallel rendering of all pages and the merge |
//! | [`posts`] | Loading `YYYY-MM-DD-slug.md` posts with YAML front matter |
//! | [`pages`] | The blog's page set: posts, categories, archive, about, feed, sitemap |
//! | [`config`] | `config.toml` loading, merging, validation |
//! | [`writer`] | Writing resources to the output directory |
//! | [`report`] | JSON build report |
//! | [`output`] | CLI output formatting |
//! | [`serve`] | Preview HTTP server |
//!
//! # Failure Levels
//!
//! A missing input directory stops the build. Everything smaller is collected
//! and reported next to the files that were produced: a page whose inline file
//! is missing is skipped, a missing image is left out, and two pages writing
//! different bytes to one path are handled by the configured conflict policy.

pub mod config;
pub mod filter;
pub mod node;
pub mod output;
pub mod page;
pub mod pages;
pub mod pipeline;
pub mod posts;
pub mod report;
pub mod resource;
pub mod serve;
pub mod site;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
