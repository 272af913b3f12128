//! Machine-readable build report, written by `build --report <file>`.
//!
//! ```json
//! {
//!   "pages": 9,
//!   "resources": [
//!     { "path": "about/index.html", "bytes": 1433, "sha256": "9f86d0..." }
//!   ],
//!   "page_errors": [
//!     { "kind": "unresolved_dependency", "page": "Hello (/2021/03/04/hello/)", "path": "img/x.png" }
//!   ],
//!   "conflicts": [],
//!   "aborted_pages": []
//! }
//! ```

use crate::filter::PageError;
use crate::resource::ResourceConflict;
use crate::site::BuildOutput;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceEntry {
    pub path: String,
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub pages: usize,
    pub resources: Vec<ResourceEntry>,
    pub page_errors: Vec<PageError>,
    pub conflicts: Vec<ResourceConflict>,
    pub aborted_pages: Vec<String>,
}

impl BuildReport {
    pub fn from_output(output: &BuildOutput) -> Self {
        Self {
            pages: output.page_count,
            resources: output
                .resources
                .iter()
                .map(|r| ResourceEntry {
                    path: r.path_string(),
                    bytes: r.bytes.len(),
                    sha256: r.digest(),
                })
                .collect(),
            page_errors: output.page_errors.clone(),
            conflicts: output.conflicts.clone(),
            aborted_pages: output.aborted_pages.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
