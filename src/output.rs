//! CLI output formatting for the `check` and `build` commands.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Pages
//! 001 Hello → 2020/11/02/hello/index.html
//! 002 Notes → notes/index.html
//! 003 Feed → atom.xml
//!
//! 3 pages, 6 filters: inline → markdown → highlight → dependency → gather → encode
//! ```
//!
//! ## Build
//!
//! stdout:
//!
//! ```text
//! Resources
//!     2020/11/02/hello/index.html (1.2 KB)
//!     img/logo.png (4.0 KB)
//!
//! Wrote 2 files (5.2 KB) → Site
//! ```
//!
//! stderr, only when something went wrong:
//!
//! ```text
//! Page errors
//!     Hello (/2020/11/02/hello/): dependency not found: img/missing.png
//!
//! Conflicts
//!     conflicting content for notes/index.html: Notes (/notes/) (9f86d081884c) vs ...
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout (problems to stderr). Format functions
//! are pure: no I/O, no side effects.

use crate::filter::Filter;
use crate::page::Page;
use crate::site::BuildOutput;
use crate::writer::WriteReport;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count: `512 B`, `1.4 KB`, `2.0 MB`.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(pages: &[Page], filters: &[Box<dyn Filter>]) -> Vec<String> {
    let mut lines = vec!["Pages".to_string()];
    for (i, page) in pages.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            page.title,
            page.route.output_path().join("/")
        ));
    }
    lines.push(String::new());
    let names: Vec<&str> = filters.iter().map(|f| f.name()).collect();
    lines.push(format!(
        "{}, {}: {}",
        plural(pages.len(), "page"),
        plural(filters.len(), "filter"),
        names.join(" → ")
    ));
    lines
}

pub fn print_check_output(pages: &[Page], filters: &[Box<dyn Filter>]) {
    for line in format_check_output(pages, filters) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Resources and the closing summary line, for stdout.
pub fn format_build_output(
    output: &BuildOutput,
    written: &WriteReport,
    output_dir: &Path,
) -> Vec<String> {
    let mut lines = vec!["Resources".to_string()];
    for resource in &output.resources {
        lines.push(format!(
            "{}{} ({})",
            indent(1),
            resource.path_string(),
            format_bytes(resource.bytes.len() as u64)
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Wrote {} ({}) → {}",
        plural(written.written.len(), "file"),
        format_bytes(written.bytes),
        output_dir.display()
    ));
    lines
}

/// Page errors, conflicts and write failures, for stderr. Empty on a clean build.
pub fn format_build_problems(output: &BuildOutput, written: &WriteReport) -> Vec<String> {
    let mut lines = Vec::new();
    let mut section = |title: &str, items: Vec<String>| {
        if items.is_empty() {
            return;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(title.to_string());
        lines.extend(items.into_iter().map(|item| format!("{}{}", indent(1), item)));
    };

    section("Page errors", output.page_errors.iter().map(ToString::to_string).collect());
    section("Conflicts", output.conflicts.iter().map(ToString::to_string).collect());
    section("Write failures", written.failures.iter().map(ToString::to_string).collect());
    lines
}

pub fn print_build_output(output: &BuildOutput, written: &WriteReport, output_dir: &Path) {
    for line in format_build_output(output, written, output_dir) {
        println!("{}", line);
    }
    for line in format_build_problems(output, written) {
        eprintln!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DependencyFilter, EncodeFilter, PageError};
    use crate::node::Node;
    use crate::page::{Layout, Route};
    use crate::resource::{Resource, ResourceConflict};
    use std::path::PathBuf;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.0 MB");
    }

    #[test]
    fn check_lists_pages_and_filters() {
        let pages = vec![
            Page::new(Route::new(["about"]), "About", Layout::Page, Node::empty),
            Page::new(Route::file(["atom.xml"]), "Feed", Layout::Empty, Node::empty),
        ];
        let filters: Vec<Box<dyn Filter>> = vec![Box::new(DependencyFilter), Box::new(EncodeFilter)];
        let lines = format_check_output(&pages, &filters);
        assert_eq!(
            lines,
            vec![
                "Pages",
                "001 About → about/index.html",
                "002 Feed → atom.xml",
                "",
                "2 pages, 2 filters: dependency → encode",
            ]
        );
    }

    #[test]
    fn build_output_clean() {
        let output = BuildOutput {
            resources: vec![Resource::at("index.html", "hello")],
            page_count: 1,
            ..BuildOutput::default()
        };
        let written = WriteReport {
            written: vec![PathBuf::from("Site/index.html")],
            bytes: 5,
            failures: Vec::new(),
        };
        let lines = format_build_output(&output, &written, Path::new("Site"));
        assert_eq!(
            lines,
            vec![
                "Resources",
                "    index.html (5 B)",
                "",
                "Wrote 1 file (5 B) → Site",
            ]
        );
    }

    #[test]
    fn problems_are_listed_separately() {
        let output = BuildOutput {
            page_errors: vec![PageError::UnresolvedDependency {
                page: "Home (/)".into(),
                path: "img/x.png".into(),
            }],
            conflicts: vec![ResourceConflict {
                path: "x/index.html".into(),
                first_page: "A (/x/)".into(),
                first_digest: "aaaaaaaaaaaaaaaa".into(),
                second_page: "B (/x/)".into(),
                second_digest: "bbbbbbbbbbbbbbbb".into(),
            }],
            ..BuildOutput::default()
        };
        let written = WriteReport::default();

        let lines = format_build_output(&output, &written, Path::new("Site"));
        assert!(!lines.contains(&"Page errors".to_string()));
        assert_eq!(lines.last().unwrap(), "Wrote 0 files (0 B) → Site");

        assert_eq!(
            format_build_problems(&output, &written),
            vec![
                "Page errors",
                "    Home (/): dependency not found: img/x.png",
                "",
                "Conflicts",
                "    conflicting content for x/index.html: A (/x/) (aaaaaaaaaaaa) vs B (/x/) (bbbbbbbbbbbb)",
            ]
        );
    }

    #[test]
    fn clean_build_has_no_problems() {
        assert!(format_build_problems(&BuildOutput::default(), &WriteReport::default()).is_empty());
    }
}
