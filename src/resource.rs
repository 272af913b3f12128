//! Output artifacts and the merge that combines every page's artifacts.
//!
//! A [`Resource`] is a path plus bytes with structural identity: two resources
//! are equal exactly when both path and bytes are equal. The [`ResourceSet`]
//! folds resources from all pages into one set:
//!
//! - same path, same bytes: collapsed into one entry (a stylesheet shared by
//!   several pages is emitted once)
//! - same path, different bytes: a [`ResourceConflict`], handled according to
//!   the configured [`ConflictPolicy`]
//!
//! Entries are keyed by path in a `BTreeMap`, so iteration order is the sorted
//! path order regardless of which worker finished first.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    pub path: Vec<String>,
    pub bytes: Vec<u8>,
}

impl Resource {
    pub fn new(path: Vec<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            bytes: bytes.into(),
        }
    }

    /// Build from a `/`-separated relative path like `img/logo.png`.
    pub fn at(path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(split_path(path), bytes)
    }

    /// The path joined with `/`.
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }

    /// Hex SHA-256 of the bytes.
    pub fn digest(&self) -> String {
        digest_hex(&self.bytes)
    }
}

pub(crate) fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn digest_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// What to do with a path once two pages have produced different bytes for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Drop the path from the output entirely.
    #[default]
    Exclude,
    /// Keep the bytes of the first contributor in page order.
    KeepFirst,
    /// Fail the whole build.
    Abort,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Exclude => write!(f, "exclude"),
            ConflictPolicy::KeepFirst => write!(f, "keep-first"),
            ConflictPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Two pages produced different bytes for the same output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceConflict {
    pub path: String,
    pub first_page: String,
    pub first_digest: String,
    pub second_page: String,
    pub second_digest: String,
}

impl fmt::Display for ResourceConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting content for {}: {} ({}) vs {} ({})",
            self.path,
            self.first_page,
            &self.first_digest[..12.min(self.first_digest.len())],
            self.second_page,
            &self.second_digest[..12.min(self.second_digest.len())],
        )
    }
}

impl std::error::Error for ResourceConflict {}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    contributor: String,
}

/// Deduplicating accumulator for the resources of a whole build.
#[derive(Debug, Default)]
pub struct ResourceSet {
    entries: BTreeMap<Vec<String>, Entry>,
    conflicted: BTreeSet<Vec<String>>,
    policy: ConflictPolicy,
}

impl ResourceSet {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Add one resource produced by `contributor`.
    ///
    /// Returns the conflict, if any. Under [`ConflictPolicy::Exclude`] the path is
    /// removed and stays removed for the rest of the build; under
    /// [`ConflictPolicy::KeepFirst`] and [`ConflictPolicy::Abort`] the first
    /// bytes stay in place (aborting is the caller's decision).
    pub fn insert(
        &mut self,
        resource: Resource,
        contributor: &str,
    ) -> Option<ResourceConflict> {
        match self.entries.get(&resource.path) {
            None if self.conflicted.contains(&resource.path) => {
                // Excluded earlier: report again, never re-add.
                Some(ResourceConflict {
                    path: resource.path_string(),
                    first_page: "(excluded)".to_string(),
                    first_digest: String::new(),
                    second_page: contributor.to_string(),
                    second_digest: resource.digest(),
                })
            }
            None => {
                self.entries.insert(
                    resource.path,
                    Entry {
                        bytes: resource.bytes,
                        contributor: contributor.to_string(),
                    },
                );
                None
            }
            Some(existing) if existing.bytes == resource.bytes => None,
            Some(existing) => {
                let conflict = ResourceConflict {
                    path: resource.path_string(),
                    first_page: existing.contributor.clone(),
                    first_digest: digest_hex(&existing.bytes),
                    second_page: contributor.to_string(),
                    second_digest: resource.digest(),
                };
                self.conflicted.insert(resource.path.clone());
                if self.policy == ConflictPolicy::Exclude {
                    self.entries.remove(&resource.path);
                }
                Some(conflict)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_path(&self, path: &[String]) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(&split_path(path)).map(|e| e.bytes.as_slice())
    }

    /// Paths that saw at least one conflict, sorted.
    pub fn conflicted_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.conflicted.iter().map(|p| p.join("/"))
    }

    /// Resources in sorted path order.
    pub fn iter(&self) -> impl Iterator<Item = Resource> + '_ {
        self.entries
            .iter()
            .map(|(path, e)| Resource::new(path.clone(), e.bytes.clone()))
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.entries
            .into_iter()
            .map(|(path, e)| Resource::new(path, e.bytes))
            .collect()
    }
}
