//! Shared test utilities: on-disk site fixtures in temp directories.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = site_base();
//! let (site, _config) = Site::load(tmp.path()).unwrap();
//! let out = site.generate().unwrap();
//! assert_contains(out.get("index.html").unwrap(), "<h1>");
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

pub const BASE_CSS: &str = "body { font-family: serif; }";
pub const NAVIGATION_CSS: &str = "#navigation ul { display: flex; }";
pub const ABOUT_MD: &str = "# About\n\nWritten by *me*.\n";
pub const LOGO_PNG: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

/// Write `files` (path, content) below `dir`, creating parents.
pub fn write_files(dir: &Path, files: &[(&str, &[u8])]) {
    for (path, content) in files {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

/// A base directory with a `Resources/` root holding `files`, and nothing else.
pub fn resource_root(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("Resources")).unwrap();
    for (path, content) in files {
        write_files(&tmp.path().join("Resources"), &[(*path, content.as_bytes())]);
    }
    tmp
}

/// A complete blog: layouts' stylesheets, the about text, a logo, and two
/// posts in different years sharing a category.
pub fn site_base() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_files(
        &tmp.path().join("Resources"),
        &[
            ("css/base.css", BASE_CSS.as_bytes()),
            ("css/navigation.css", NAVIGATION_CSS.as_bytes()),
            ("md/about.md", ABOUT_MD.as_bytes()),
            ("img/logo.png", LOGO_PNG),
        ],
    );
    write_files(
        &tmp.path().join("Posts"),
        &[
            (
                "2020-11-02-hello.md",
                &b"---\ntitle: Hello\ncategories: notes\n---\nFirst post.\n"[..],
            ),
            (
                "2021/2021-03-04-with-code.md",
                &b"---\ntitle: With code\ndescription: Some Rust\ncategories: [notes, rust]\n---\n\
                  ![logo](./img/logo.png)\n\n```rust\nfn main() {}\n```\n"[..],
            ),
        ],
    );
    tmp
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert that `bytes` as UTF-8 contains `needle`, printing the document on failure.
pub fn assert_contains(bytes: &[u8], needle: &str) {
    let text = String::from_utf8_lossy(bytes);
    assert!(text.contains(needle), "expected {needle:?} in:\n{text}");
}
