//! The concrete page set of a blog.
//!
//! | Page | Route | Layout |
//! |------|-------|--------|
//! | one per post | `/YYYY/MM/DD/slug/` | page |
//! | one per category | `/<category>/` | page |
//! | archive | `/archive/` | page |
//! | about | `/about/` (markdown from `md/about.md`) | page |
//! | front page | `/` | basic |
//! | Atom feed | `/atom.xml` | empty |
//! | sitemap | `/sitemap.xml` | empty |
//!
//! Pages only describe trees; inlining, markdown, highlighting and asset
//! gathering all happen later in the filter chain. The one exception is the
//! feed, whose entry bodies are rendered to HTML text when the tree is built.

use crate::config::{SiteConfig, SiteInfo};
use crate::filter::{encode_html, parse_markdown};
use crate::node::{Element, Node, el};
use crate::page::{Layout, Page, Route};
use crate::posts::{Post, PostDate};
use std::collections::BTreeMap;
use std::sync::Arc;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Every page of the site in build order: posts, category indices, about,
/// archive, feed, front page, then the sitemap listing all of them.
pub fn site_pages(config: &SiteConfig, posts: Vec<Post>) -> Vec<Page> {
    let posts: Vec<Arc<Post>> = posts.into_iter().map(Arc::new).collect();

    let mut pages: Vec<Page> = posts.iter().cloned().map(post_page).collect();
    pages.extend(category_pages(&posts));
    pages.push(about_page());
    pages.push(archive_page(&posts));
    pages.push(atom_feed(
        &config.site,
        &posts,
        config.build.feed_entries,
        config.markdown.max_nesting,
    ));
    pages.push(front_page(&config.site, posts.last().cloned()));

    let sitemap = sitemap(&config.site, &pages);
    pages.push(sitemap);
    pages
}

// =============================================================================
// Shared fragments
// =============================================================================

fn time(date: PostDate) -> Element {
    let iso = date.to_string();
    el("time").attr("datetime", iso.clone()).child(iso)
}

fn post_link(post: &Post) -> Element {
    el("a")
        .attr("href", post.route().url_path())
        .child(post.title.as_str())
}

/// `[ 2021-03-04 ] Title` list entry, optionally with the description below.
fn post_entry(post: &Post, with_description: bool) -> Node {
    let mut li = el("li")
        .child("[ ")
        .child(time(post.date))
        .child(" ] ")
        .child(post_link(post));
    if let Some(description) = post.description.as_deref().filter(|_| with_description) {
        li = li.child(el("br")).child(description);
    }
    li.into()
}

/// Route segment for a category: lowercase, runs of anything but letters and
/// digits collapsed to `-`.
pub fn category_slug(category: &str) -> String {
    let mut slug = String::with_capacity(category.len());
    for c in category.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn titlecase(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// HTML pages
// =============================================================================

pub fn post_page(post: Arc<Post>) -> Page {
    let route = post.route();
    let title = post.title.clone();
    Page::new(route, title, Layout::Page, move || {
        let mut meta = el("p").attr("class", "meta").child(time(post.date));
        for category in &post.categories {
            let slug = category_slug(category);
            if slug.is_empty() {
                continue;
            }
            meta = meta.child(" ").child(
                el("a")
                    .attr("class", "category")
                    .attr("href", format!("/{slug}/"))
                    .child(category.as_str()),
            );
        }
        el("article")
            .attr("class", "post")
            .child(
                el("header")
                    .child(el("h1").child(post.title.as_str()))
                    .child(meta),
            )
            .child(Node::markdown(post.body.as_str()))
            .into()
    })
}

/// One index per distinct category, newest post first, ordered by slug.
pub fn category_pages(posts: &[Arc<Post>]) -> Vec<Page> {
    let mut by_slug: BTreeMap<String, (String, Vec<Arc<Post>>)> = BTreeMap::new();
    for post in posts {
        for category in &post.categories {
            let slug = category_slug(category);
            if slug.is_empty() {
                continue;
            }
            by_slug
                .entry(slug)
                .or_insert_with(|| (titlecase(category), Vec::new()))
                .1
                .push(Arc::clone(post));
        }
    }

    by_slug
        .into_iter()
        .map(|(slug, (title, posts))| {
            Page::new(Route::new([slug]), title, Layout::Page, move || {
                el("ul")
                    .attr("class", "posts")
                    .children(posts.iter().rev().map(|p| post_entry(p, true)))
                    .into()
            })
        })
        .collect()
}

/// Posts grouped by year, newest year and newest post first.
pub fn archive_page(posts: &[Arc<Post>]) -> Page {
    let posts = posts.to_vec();
    Page::new(Route::new(["archive"]), "Archive", Layout::Page, move || {
        let mut by_year: BTreeMap<u16, Vec<&Post>> = BTreeMap::new();
        for post in &posts {
            by_year.entry(post.date.year).or_default().push(post);
        }
        Node::fragment(by_year.into_iter().rev().flat_map(|(year, posts)| {
            [
                Node::from(el("h2").child(year.to_string())),
                el("ul")
                    .children(posts.into_iter().rev().map(|p| post_entry(p, false)))
                    .into(),
            ]
        }))
    })
}

pub fn about_page() -> Page {
    Page::new(Route::new(["about"]), "About", Layout::Page, || {
        Node::markdown_of([Node::inline("md/about.md")])
    })
}

/// Site root: introduction and a link to the newest post, when there is one.
pub fn front_page(site: &SiteInfo, highlight: Option<Arc<Post>>) -> Page {
    let title = site.title.clone();
    Page::new(Route::root(), site.title.clone(), Layout::Basic, move || {
        let latest = match &highlight {
            Some(post) => el("p")
                .child("Latest post: ")
                .child(post_link(post))
                .child(" from ")
                .child(time(post.date))
                .child("."),
            None => el("p").child("Nothing published yet."),
        };
        el("header")
            .attr("id", "header")
            .child(
                el("section")
                    .attr("id", "intro")
                    .child(el("h1").child(title.as_str()))
                    .child(latest),
            )
            .child(
                el("p")
                    .child("Browse the ")
                    .child(el("a").attr("href", "/archive/").child("archive"))
                    .child(", read ")
                    .child(el("a").attr("href", "/about/").child("about this site"))
                    .child(" or subscribe to the ")
                    .child(el("a").attr("href", "/atom.xml").child("feed"))
                    .child("."),
            )
            .into()
    })
}

// =============================================================================
// XML pages
// =============================================================================

/// Atom feed of the newest `entries` posts, newest first.
///
/// Entry bodies are rendered to HTML here and carried as escaped text
/// (`type="html"`), so raw HTML in a post cannot break the feed's XML.
pub fn atom_feed(site: &SiteInfo, posts: &[Arc<Post>], entries: usize, max_nesting: usize) -> Page {
    let site = site.clone();
    let recent: Vec<Arc<Post>> = posts.iter().rev().take(entries).cloned().collect();
    Page::new(Route::file(["atom.xml"]), "Feed", Layout::Empty, move || {
        let updated = recent
            .first()
            .map(|p| p.date.rfc3339())
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
        let home = site.absolute_url("/");

        let mut feed = el("feed")
            .attr("xmlns", ATOM_NS)
            .child(el("title").child(site.title.as_str()))
            .child(
                el("link")
                    .attr("href", site.absolute_url("/atom.xml"))
                    .attr("rel", "self"),
            )
            .child(el("link").attr("href", home.clone()))
            .child(el("updated").child(updated))
            .child(el("id").child(home));
        if !site.author.is_empty() {
            feed = feed.child(el("author").child(el("name").child(site.author.as_str())));
        }

        for post in &recent {
            let url = site.absolute_url(&post.route().url_path());
            let entry = el("entry")
                .child(el("title").child(post.title.as_str()))
                .child(el("link").attr("href", url.clone()))
                .child(el("id").child(url))
                .child(el("updated").child(post.date.rfc3339()))
                .children(
                    post.description
                        .as_deref()
                        .map(|d| el("summary").child(d)),
                )
                .child(
                    el("content")
                        .attr("type", "html")
                        .child(entry_html(&post.body, max_nesting)),
                );
            feed = feed.child(entry);
        }

        Node::fragment([Node::raw(XML_DECLARATION), feed.into()])
    })
}

/// A post body as an HTML string; unparseable markdown is kept as its source.
fn entry_html(body: &str, max_nesting: usize) -> String {
    match parse_markdown(body, max_nesting) {
        Ok(nodes) => encode_html(&Node::fragment(nodes)),
        Err(_) => body.to_string(),
    }
}

/// Sitemap listing every page given.
pub fn sitemap(site: &SiteInfo, pages: &[Page]) -> Page {
    let urls: Vec<String> = pages
        .iter()
        .map(|p| site.absolute_url(&p.route.url_path()))
        .collect();
    Page::new(Route::file(["sitemap.xml"]), "Sitemap", Layout::Empty, move || {
        Node::fragment([
            Node::raw(XML_DECLARATION),
            el("urlset")
                .attr("xmlns", SITEMAP_NS)
                .children(
                    urls.iter()
                        .map(|u| el("url").child(el("loc").child(u.as_str()))),
                )
                .into(),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MARKDOWN_TAG;
    use crate::posts::{parse_post, parse_post_name};
    use std::path::Path;

    fn post(stem: &str, front: &str) -> Arc<Post> {
        let content = format!("---\n{front}\n---\nBody of {stem}\n");
        Arc::new(parse_post(Path::new("x.md"), parse_post_name(stem).unwrap(), &content).unwrap())
    }

    fn links(node: &Node) -> Vec<String> {
        let mut out = Vec::new();
        node.walk(&mut |e| {
            if e.name == "a" {
                out.push(e.get_attr("href").unwrap_or_default().to_string());
            }
        });
        out
    }

    #[test]
    fn category_slugs() {
        assert_eq!(category_slug("Rust"), "rust");
        assert_eq!(category_slug("Open Source"), "open-source");
        assert_eq!(category_slug("node.js / web"), "node-js-web");
        assert_eq!(category_slug("---"), "");
    }

    #[test]
    fn titlecase_words() {
        assert_eq!(titlecase("open source"), "Open Source");
    }

    #[test]
    fn post_page_wraps_markdown_body() {
        let page = post_page(post("2021-03-04-hello", "title: Hello\ncategories: [Rust]"));
        assert_eq!(page.route.url_path(), "/2021/03/04/hello/");
        assert_eq!(page.layout, Layout::Page);

        let content = page.content();
        let mut markdown = Vec::new();
        content.walk(&mut |e| {
            if e.name == MARKDOWN_TAG {
                markdown.push(Node::Element(e.clone()).text_content());
            }
        });
        assert_eq!(markdown, vec!["Body of 2021-03-04-hello\n"]);
        assert_eq!(links(&content), vec!["/rust/"]);
    }

    #[test]
    fn categories_are_grouped_newest_first() {
        let posts = vec![
            post("2020-01-01-a", "categories: [Rust]"),
            post("2021-01-01-b", "categories: [rust, notes]"),
        ];
        let pages = category_pages(&posts);
        let routes: Vec<_> = pages.iter().map(|p| p.route.url_path()).collect();
        assert_eq!(routes, vec!["/notes/", "/rust/"]);
        assert_eq!(pages[1].title, "Rust");
        assert_eq!(
            links(&pages[1].content()),
            vec!["/2021/01/01/b/", "/2020/01/01/a/"]
        );
    }

    #[test]
    fn archive_groups_by_year_descending() {
        let posts = vec![
            post("2020-05-01-a", ""),
            post("2021-01-01-b", ""),
            post("2021-06-01-c", ""),
        ];
        let content = archive_page(&posts).content();
        let mut headings = Vec::new();
        content.walk(&mut |e| {
            if e.name == "h2" {
                headings.push(Node::Element(e.clone()).text_content());
            }
        });
        assert_eq!(headings, vec!["2021", "2020"]);
        assert_eq!(
            links(&content),
            vec!["/2021/06/01/c/", "/2021/01/01/b/", "/2020/05/01/a/"]
        );
    }

    #[test]
    fn front_page_links_newest_post() {
        let site = SiteInfo::default();
        let page = front_page(&site, Some(post("2021-06-01-c", "title: Newest")));
        assert_eq!(page.route, Route::root());
        assert_eq!(page.layout, Layout::Basic);
        assert_eq!(links(&page.content())[0], "/2021/06/01/c/");

        let empty = front_page(&site, None);
        assert!(empty.content().text_content().contains("Nothing published yet."));
    }

    #[test]
    fn feed_takes_newest_entries() {
        let posts: Vec<_> = (1..=5)
            .map(|d| post(&format!("2021-01-0{d}-p{d}"), ""))
            .collect();
        let feed = atom_feed(&SiteInfo::default(), &posts, 2, 64).content();
        let mut ids = Vec::new();
        feed.walk(&mut |e| {
            if e.name == "entry" {
                for child in &e.children {
                    if let Some(id) = child.as_element().filter(|c| c.name == "id") {
                        ids.push(Node::Element(id.clone()).text_content());
                    }
                }
            }
        });
        assert_eq!(
            ids,
            vec![
                "http://localhost:3000/2021/01/05/p5/",
                "http://localhost:3000/2021/01/04/p4/"
            ]
        );
    }

    #[test]
    fn feed_escapes_raw_html_in_post_bodies() {
        let content = "---\ntitle: Raw\n---\nline<br>break\n\n<img src=\"a.png\">\n";
        let raw = Arc::new(
            parse_post(Path::new("x.md"), parse_post_name("2021-01-01-raw").unwrap(), content)
                .unwrap(),
        );
        let feed = atom_feed(&SiteInfo::default(), &[raw], 10, 64);
        assert_eq!(feed.route.output_path(), vec!["atom.xml"]);

        let xml = crate::filter::encode_document(&feed.content());
        assert!(xml.contains("<content type=\"html\">&lt;p&gt;line&lt;br&gt;break&lt;/p&gt;"), "{xml}");
        assert!(xml.contains("&lt;img src=&quot;a.png&quot;&gt;"), "{xml}");
        assert!(!xml.contains("<br>"));
        assert!(!xml.contains("<img"));
    }

    #[test]
    fn site_pages_order_and_sitemap() {
        let mut config = SiteConfig::default();
        config.site.base_url = "https://example.com".into();
        let posts = vec![
            Arc::unwrap_or_clone(post("2021-01-01-a", "categories: notes")),
        ];
        let pages = site_pages(&config, posts);
        let routes: Vec<_> = pages.iter().map(|p| p.route.url_path()).collect();
        assert_eq!(
            routes,
            vec![
                "/2021/01/01/a/",
                "/notes/",
                "/about/",
                "/archive/",
                "/atom.xml",
                "/",
                "/sitemap.xml"
            ]
        );

        let sitemap = pages.last().unwrap().content();
        let mut locs = Vec::new();
        sitemap.walk(&mut |e| {
            if e.name == "loc" {
                locs.push(Node::Element(e.clone()).text_content());
            }
        });
        assert_eq!(locs.len(), 6);
        assert_eq!(locs[0], "https://example.com/2021/01/01/a/");
        assert_eq!(locs[5], "https://example.com/");
    }
}
