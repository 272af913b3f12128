//! Posts collection: Jekyll-style markdown files under the posts directory.
//!
//! Every file named `YYYY-MM-DD-slug.md` (at any depth) is a post. The date and
//! slug come from the filename; the rest of the metadata from optional YAML
//! front matter:
//!
//! ```text
//! ---
//! title: Hello, world
//! description: First post
//! categories: [rust, notes]     # or a single string
//! ---
//! Markdown body...
//! ```
//!
//! Without a `title`, the slug is used with dashes turned into spaces
//! (`2021-03-04-first-light.md` → "first light"). Files that don't follow the
//! naming pattern are skipped.

use crate::page::Route;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Posts directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error walking posts directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid front matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Calendar date of a post, taken from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl PostDate {
    /// Midnight UTC in RFC 3339, as Atom wants it.
    pub fn rfc3339(&self) -> String {
        format!("{self}T00:00:00Z")
    }
}

impl fmt::Display for PostDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Result of parsing a post filename stem like `2021-03-04-first-light`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPostName {
    pub date: PostDate,
    /// Everything after the date, dashes preserved.
    pub slug: String,
    /// Slug with dashes converted to spaces.
    pub display_title: String,
}

/// Parse a post filename stem following the `YYYY-MM-DD-slug` convention.
///
/// - `"2021-03-04-first-light"` → 2021-03-04, slug `first-light`, title "first light"
/// - `"2021-13-04-x"` → `None` (no month 13)
/// - `"2021-03-04"` → `None` (no slug)
/// - `"notes"` → `None`
pub fn parse_post_name(stem: &str) -> Option<ParsedPostName> {
    let mut parts = stem.splitn(4, '-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    let slug = parts.next()?;

    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(year, 4) || !digits(month, 2) || !digits(day, 2) || slug.is_empty() {
        return None;
    }

    let date = PostDate {
        year: year.parse().ok()?,
        month: month.parse().ok()?,
        day: day.parse().ok()?,
    };
    if !(1..=12).contains(&date.month) || !(1..=31).contains(&date.day) {
        return None;
    }

    Some(ParsedPostName {
        date,
        slug: slug.to_string(),
        display_title: slug.replace('-', " "),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    description: Option<String>,
    categories: Categories,
}

/// `categories: rust` and `categories: [rust, notes]` are both accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Categories {
    One(String),
    Many(Vec<String>),
}

impl Default for Categories {
    fn default() -> Self {
        Categories::Many(Vec::new())
    }
}

impl Categories {
    fn into_vec(self) -> Vec<String> {
        let list = match self {
            Categories::One(s) => s.split_whitespace().map(str::to_string).collect(),
            Categories::Many(v) => v,
        };
        let mut out: Vec<String> = Vec::new();
        for c in list.into_iter().map(|c| c.trim().to_string()) {
            if !c.is_empty() && !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }
}

/// A single post, ready to be turned into pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub date: PostDate,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    /// Markdown after the front matter.
    pub body: String,
    pub source: PathBuf,
}

impl Post {
    /// `[yyyy, mm, dd, slug]`.
    pub fn route(&self) -> Route {
        Route::new([
            format!("{:04}", self.date.year),
            format!("{:02}", self.date.month),
            format!("{:02}", self.date.day),
            self.slug.clone(),
        ])
    }
}

/// Split `---` delimited front matter from the body.
///
/// Returns `(None, content)` when the file does not open with a `---` line or
/// the block is never closed.
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }
    (None, content)
}

/// Build a post from its filename and file content.
pub fn parse_post(path: &Path, name: ParsedPostName, content: &str) -> Result<Post, PostError> {
    let (yaml, body) = split_front_matter(content);
    let front: FrontMatter = match yaml.map(str::trim) {
        Some(y) if !y.is_empty() => {
            serde_yaml::from_str(y).map_err(|source| PostError::FrontMatter {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => FrontMatter::default(),
    };

    Ok(Post {
        date: name.date,
        title: front
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(name.display_title),
        slug: name.slug,
        description: front.description,
        categories: front.categories.into_vec(),
        body: body.to_string(),
        source: path.to_path_buf(),
    })
}

/// Load every post under `dir`, oldest first (ties broken by slug).
pub fn load_posts(dir: &Path) -> Result<Vec<Post>, PostError> {
    if !dir.is_dir() {
        return Err(PostError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut posts = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            debug!(path = %path.display(), "skipping non-markdown file");
            continue;
        }
        let Some(name) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_post_name)
        else {
            debug!(path = %path.display(), "skipping file without YYYY-MM-DD-slug name");
            continue;
        };

        let content = std::fs::read_to_string(path).map_err(|source| PostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        posts.push(parse_post(path, name, &content)?);
    }

    posts.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.slug.cmp(&b.slug)));
    debug!(count = posts.len(), dir = %dir.display(), "loaded posts");
    Ok(posts)
}
