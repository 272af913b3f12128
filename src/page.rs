//! Pages: named, routed producers of an initial document tree.
//!
//! A [`Page`] is immutable value data. The pipeline calls [`Page::document`]
//! once per build to obtain the tree it transforms; the page itself is never
//! modified.

use crate::node::{Node, el};
use std::fmt;
use std::sync::Arc;

/// Ordered path segments locating a page in the output tree. Empty is the site root.
///
/// Most routes name a directory and get an `index.html`; a file route, built
/// with [`Route::file`], names its output file directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Route {
    segments: Vec<String>,
    file: bool,
}

impl Route {
    pub fn root() -> Self {
        Self::default()
    }

    /// A directory route: `["2021", "v1.2-release"]` → `2021/v1.2-release/index.html`.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            file: false,
        }
    }

    /// A route whose last segment is the output file name: `["atom.xml"]` → `atom.xml`.
    pub fn file<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let route = Self::new(segments);
        Self {
            file: !route.segments.is_empty(),
            ..route
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_file(&self) -> bool {
        self.file
    }

    /// Output path of the page's document.
    ///
    /// `["about"]` → `about/index.html`, `[]` → `index.html`,
    /// file route `["atom.xml"]` → `atom.xml`.
    pub fn output_path(&self) -> Vec<String> {
        let mut path = self.segments.clone();
        if !self.is_file() {
            path.push("index.html".to_string());
        }
        path
    }

    /// Site-absolute URL path: `/about/`, `/`, `/atom.xml`.
    pub fn url_path(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let joined = self.segments.join("/");
        if self.is_file() {
            format!("/{joined}")
        } else {
            format!("/{joined}/")
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url_path())
    }
}

/// The wrapper a page's content is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Doctype, `html`, `head` with the base stylesheet inlined, `body`.
    Basic,
    /// [`Layout::Basic`] plus the site navigation header.
    Page,
    /// The content as is (feeds, sitemaps).
    Empty,
}

impl Layout {
    pub fn render(self, title: &str, content: Node) -> Node {
        match self {
            Layout::Empty => content,
            Layout::Basic => Node::fragment([
                Node::doctype("html"),
                el("html")
                    .attr("lang", "en-US")
                    .child(
                        el("head")
                            .child(el("meta").attr("charset", "utf-8"))
                            .child(
                                el("meta")
                                    .attr("name", "viewport")
                                    .attr("content", "width=device-width, initial-scale=1.0"),
                            )
                            .child(el("title").child(title))
                            .child(el("style").child(Node::inline("css/base.css"))),
                    )
                    .child(el("body").child(content))
                    .into(),
            ]),
            Layout::Page => Layout::Basic.render(
                title,
                Node::fragment([
                    Node::from(el("header").attr("id", "header").child(navigation())),
                    el("section").attr("id", "content").child(content).into(),
                ]),
            ),
        }
    }
}

fn navigation() -> Node {
    let link = |href: &str, label: &str| el("li").child(el("a").attr("href", href).child(label));
    el("nav")
        .attr("id", "navigation")
        .child(el("style").child(Node::inline("css/navigation.css")))
        .child(el("h1").child(el("a").attr("href", "/").child("Home")))
        .child(
            el("ul")
                .child(link("/about/", "About"))
                .child(link("/archive/", "Archive"))
                .child(link("/atom.xml", "Feed")),
        )
        .into()
}

type Producer = Arc<dyn Fn() -> Node + Send + Sync>;

/// A routed content source.
#[derive(Clone)]
pub struct Page {
    pub route: Route,
    pub title: String,
    pub layout: Layout,
    content: Producer,
}

impl Page {
    pub fn new(
        route: Route,
        title: impl Into<String>,
        layout: Layout,
        content: impl Fn() -> Node + Send + Sync + 'static,
    ) -> Self {
        Self {
            route,
            title: title.into(),
            layout,
            content: Arc::new(content),
        }
    }

    /// The page's content tree, before any layout.
    pub fn content(&self) -> Node {
        (self.content)()
    }

    /// The initial document handed to the filter chain: content wrapped in the layout.
    pub fn document(&self) -> Node {
        self.layout.render(&self.title, self.content())
    }

    /// Human-readable identity used in error reports: `Title (/route/)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.title, self.route)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("route", &self.route)
            .field("title", &self.title)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
