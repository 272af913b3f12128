//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the site's base directory is merged on
//! top key by key, so it only needs the values it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── config.toml      # optional
//! ├── Posts/           # YYYY-MM-DD-slug.md
//! ├── Resources/       # css/, md/, img/ ... referenced by pages
//! └── Site/            # output, created by `build`
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Inkpress"
//! author = ""
//! base_url = "http://localhost:3000"
//!
//! [paths]
//! posts = "Posts"
//! resources = "Resources"
//! output = "Site"
//!
//! [build]
//! conflict_policy = "exclude"   # exclude | keep-first | abort
//! max_threads = 4               # omit for auto = CPU cores
//! feed_entries = 10
//!
//! [markdown]
//! max_nesting = 64
//!
//! [highlight]
//! enabled = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::resource::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Identity used by layouts, the feed, and the sitemap.
    pub site: SiteInfo,
    /// Input and output directories, relative to the base directory.
    pub paths: PathsConfig,
    /// Merge policy and parallelism.
    pub build: BuildConfig,
    pub markdown: MarkdownConfig,
    pub highlight: HighlightConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markdown.max_nesting == 0 {
            return Err(ConfigError::Validation(
                "markdown.max_nesting must be at least 1".into(),
            ));
        }
        if self.build.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "build.max_threads must be at least 1 (omit for auto)".into(),
            ));
        }
        for (key, value) in [
            ("paths.posts", &self.paths.posts),
            ("paths.resources", &self.paths.resources),
            ("paths.output", &self.paths.output),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.paths.output == self.paths.resources || self.paths.output == self.paths.posts {
            return Err(ConfigError::Validation(
                "paths.output must differ from paths.posts and paths.resources".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteInfo {
    pub title: String,
    pub author: String,
    /// Absolute URL the site is served from, without trailing slash. Feed and
    /// sitemap links are built on it.
    pub base_url: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Inkpress".to_string(),
            author: String::new(),
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl SiteInfo {
    /// `base_url` joined with a site-absolute path.
    pub fn absolute_url(&self, url_path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), url_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub posts: String,
    pub resources: String,
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            posts: "Posts".to_string(),
            resources: "Resources".to_string(),
            output: "Site".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn posts_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.posts)
    }

    pub fn resources_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.resources)
    }

    pub fn output_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.output)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub conflict_policy: ConflictPolicy,
    /// Maximum number of pages rendered in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
    /// How many of the newest posts the Atom feed carries.
    pub feed_entries: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            max_threads: None,
            feed_entries: 10,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &BuildConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Deepest element nesting accepted before the source is kept as text.
    pub max_nesting: usize,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { max_nesting: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    pub enabled: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site's base directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(base_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(base_dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Inkpress Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the site's base directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
# Shown in page titles and the Atom feed.
title = "Inkpress"

# Feed author name.
author = ""

# Absolute URL the site is served from. Feed and sitemap links use it.
base_url = "http://localhost:3000"

# ---------------------------------------------------------------------------
# Directories (relative to the base directory)
# ---------------------------------------------------------------------------
[paths]
# Posts named YYYY-MM-DD-slug.md, optionally with YAML front matter.
posts = "Posts"

# Files pages inline or link to: css/base.css, md/about.md, img/...
resources = "Resources"

# Where the generated site is written.
output = "Site"

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# What happens when two pages produce different bytes for the same path:
#   exclude    - drop the path from the output and report it
#   keep-first - keep the first page's bytes and report it
#   abort      - fail the build
conflict_policy = "exclude"

# Maximum pages rendered in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_threads = 4

# Number of newest posts in atom.xml.
feed_entries = 10

# ---------------------------------------------------------------------------
# Markdown
# ---------------------------------------------------------------------------
[markdown]
# Deeper nesting than this keeps the markdown as preformatted source.
max_nesting = 64

# ---------------------------------------------------------------------------
# Syntax highlighting of fenced code blocks
# ---------------------------------------------------------------------------
[highlight]
enabled = true
"##
}
