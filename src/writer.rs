//! Filesystem writer: one file per resource under the output directory.
//!
//! Intermediate directories are created, existing files are overwritten, and
//! files with no matching resource are left alone (no pruning). A failure on
//! one file is recorded and the remaining files are still written.

use crate::resource::Resource;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Refusing to write outside the output directory: {0}")]
    UnsafePath(String),
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub bytes: u64,
    pub failures: Vec<WriteError>,
}

/// Write every resource below `output_dir`.
pub fn write_resources(resources: &[Resource], output_dir: &Path) -> WriteReport {
    let mut report = WriteReport::default();
    for resource in resources {
        match write_one(resource, output_dir) {
            Ok(path) => {
                debug!(path = %path.display(), bytes = resource.bytes.len(), "wrote");
                report.bytes += resource.bytes.len() as u64;
                report.written.push(path);
            }
            Err(e) => {
                warn!(error = %e, "write failed");
                report.failures.push(e);
            }
        }
    }
    report
}

fn write_one(resource: &Resource, output_dir: &Path) -> Result<PathBuf, WriteError> {
    if resource.path.is_empty()
        || resource
            .path
            .iter()
            .any(|s| s == ".." || s == "." || s.contains(['/', '\\']))
    {
        return Err(WriteError::UnsafePath(resource.path_string()));
    }

    let path = resource
        .path
        .iter()
        .fold(output_dir.to_path_buf(), |p, s| p.join(s));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| WriteError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&path, &resource.bytes).map_err(|source| WriteError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_nested_paths_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "old").unwrap();
        fs::write(tmp.path().join("unrelated.txt"), "keep").unwrap();

        let report = write_resources(
            &[
                Resource::at("index.html", "new"),
                Resource::at("2021/03/04/x/index.html", "post"),
            ],
            tmp.path(),
        );

        assert!(report.failures.is_empty());
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.bytes, 7);
        assert_eq!(fs::read_to_string(tmp.path().join("index.html")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(tmp.path().join("2021/03/04/x/index.html")).unwrap(),
            "post"
        );
        assert_eq!(fs::read_to_string(tmp.path().join("unrelated.txt")).unwrap(), "keep");
    }

    #[test]
    fn failures_are_collected_not_fatal() {
        let tmp = TempDir::new().unwrap();
        // A file where a directory is needed.
        fs::write(tmp.path().join("blocked"), "file").unwrap();

        let report = write_resources(
            &[
                Resource::at("blocked/index.html", "x"),
                Resource::new(vec!["..".into(), "escape.txt".into()], "x"),
                Resource::at("ok.txt", "fine"),
            ],
            tmp.path(),
        );

        assert_eq!(report.failures.len(), 2);
        assert!(matches!(report.failures[0], WriteError::Io { .. }));
        assert!(matches!(report.failures[1], WriteError::UnsafePath(_)));
        assert_eq!(report.written, vec![tmp.path().join("ok.txt")]);
    }
}
