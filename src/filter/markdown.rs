//! Stage 2: parse markdown payloads into document subtrees.
//!
//! Every `x-markdown` element is replaced by the nodes its text parses to,
//! using CommonMark semantics via `pulldown-cmark` (plus tables,
//! strikethrough, and task lists). Raw HTML in the source passes through as
//! `raw` nodes.
//!
//! Fenced code blocks come out as `pre > code.language-<hint>`, the shape the
//! highlight stage looks for.
//!
//! A payload that cannot be folded into a tree (nesting deeper than the
//! configured limit, or an unbalanced event stream) does not fail the page:
//! the source is kept verbatim in `pre.markdown-source` and a
//! [`PageError::MarkdownParseError`] is recorded.

use super::{Filter, FilterError, FilterOutput, PageContext, PageError};
use crate::node::{Element, MARKDOWN_TAG, Node, Visit, el};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use tracing::warn;

pub struct MarkdownFilter {
    max_nesting: usize,
}

impl MarkdownFilter {
    pub fn new(max_nesting: usize) -> Self {
        Self { max_nesting }
    }
}

impl Filter for MarkdownFilter {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        let tree = tree.rewrite(&mut |e| {
            if e.name != MARKDOWN_TAG {
                return Visit::Descend(e);
            }
            let source = Node::Element(e).text_content();
            match parse_markdown(&source, self.max_nesting) {
                Ok(nodes) => Visit::Replace(Node::Fragment(nodes)),
                Err(reason) => {
                    warn!(page = %ctx.label, %reason, "markdown kept as source");
                    ctx.diagnostics.push(PageError::MarkdownParseError {
                        page: ctx.label.clone(),
                        reason,
                    });
                    Visit::Replace(
                        el("pre")
                            .attr("class", "markdown-source")
                            .child(Node::text(source))
                            .into(),
                    )
                }
            }
        });
        Ok(FilterOutput::tree(tree))
    }
}

fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// How an open element is finished when its end event arrives.
enum Close {
    Plain,
    /// Children dissolve into the parent (HTML blocks, metadata).
    Transparent,
    /// `code` wrapped in `pre`.
    CodeBlock,
    /// Children become the `alt` text.
    Image,
    /// Header cells wrapped in a row.
    TableHead,
}

struct Frame {
    element: Element,
    close: Close,
}

/// Parse markdown into a flat list of block nodes.
///
/// Errors carry a human-readable reason; the caller decides how to degrade.
pub fn parse_markdown(source: &str, max_nesting: usize) -> Result<Vec<Node>, String> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_table_head = false;

    for event in Parser::new_ext(source, options()) {
        let node = match event {
            Event::Start(tag) => {
                if stack.len() >= max_nesting {
                    return Err(format!("nesting deeper than {max_nesting} levels"));
                }
                if matches!(tag, Tag::TableHead) {
                    in_table_head = true;
                }
                stack.push(open(tag, in_table_head));
                continue;
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or("unbalanced end of element")?;
                if matches!(frame.close, Close::TableHead) {
                    in_table_head = false;
                }
                close(frame)
            }
            Event::Text(text) => Node::text(text.into_string()),
            Event::Code(code) => el("code").child(Node::text(code.into_string())).into(),
            Event::InlineMath(math) => el("span")
                .attr("class", "math math-inline")
                .child(Node::text(math.into_string()))
                .into(),
            Event::DisplayMath(math) => el("span")
                .attr("class", "math math-display")
                .child(Node::text(math.into_string()))
                .into(),
            Event::Html(html) | Event::InlineHtml(html) => Node::raw(html.into_string()),
            Event::FootnoteReference(name) => el("sup")
                .attr("class", "footnote-reference")
                .child(
                    el("a")
                        .attr("href", format!("#{name}"))
                        .child(Node::text(name.into_string())),
                )
                .into(),
            Event::SoftBreak => Node::text("\n"),
            Event::HardBreak => el("br").into(),
            Event::Rule => el("hr").into(),
            Event::TaskListMarker(checked) => {
                let input = el("input").attr("type", "checkbox").attr("disabled", "");
                if checked {
                    input.attr("checked", "").into()
                } else {
                    input.into()
                }
            }
        };
        match stack.last_mut() {
            Some(parent) => parent.element.children.push(node),
            None => root.push(node),
        }
    }

    if !stack.is_empty() {
        return Err(format!("{} element(s) left open", stack.len()));
    }
    Ok(root.into_iter().flat_map(Node::flatten).collect())
}

fn open(tag: Tag<'_>, in_table_head: bool) -> Frame {
    let plain = |element: Element| Frame {
        element,
        close: Close::Plain,
    };
    match tag {
        Tag::Paragraph => plain(el("p")),
        Tag::Heading { level, id, .. } => {
            plain(el(format!("h{}", level as usize)).attr_opt("id", id.map(|i| i.into_string())))
        }
        Tag::BlockQuote(_) => plain(el("blockquote")),
        Tag::CodeBlock(kind) => {
            let lang = match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .map(|l| format!("language-{l}")),
                CodeBlockKind::Indented => None,
            };
            Frame {
                element: el("code").attr_opt("class", lang),
                close: Close::CodeBlock,
            }
        }
        Tag::HtmlBlock | Tag::MetadataBlock(_) => Frame {
            element: el("div"),
            close: Close::Transparent,
        },
        Tag::List(Some(start)) if start != 1 => plain(el("ol").attr("start", start.to_string())),
        Tag::List(Some(_)) => plain(el("ol")),
        Tag::List(None) => plain(el("ul")),
        Tag::Item => plain(el("li")),
        Tag::FootnoteDefinition(name) => plain(
            el("div")
                .attr("class", "footnote-definition")
                .attr("id", name.into_string()),
        ),
        Tag::Table(_) => plain(el("table")),
        Tag::TableHead => Frame {
            element: el("thead"),
            close: Close::TableHead,
        },
        Tag::TableRow => plain(el("tr")),
        Tag::TableCell => plain(el(if in_table_head { "th" } else { "td" })),
        Tag::Emphasis => plain(el("em")),
        Tag::Strong => plain(el("strong")),
        Tag::Strikethrough => plain(el("del")),
        Tag::Link {
            dest_url, title, ..
        } => plain(
            el("a")
                .attr("href", dest_url.into_string())
                .attr_opt("title", (!title.is_empty()).then(|| title.into_string())),
        ),
        Tag::Image {
            dest_url, title, ..
        } => Frame {
            element: el("img")
                .attr("src", dest_url.into_string())
                .attr_opt("title", (!title.is_empty()).then(|| title.into_string())),
            close: Close::Image,
        },
        _ => plain(el("span")),
    }
}

fn close(frame: Frame) -> Node {
    let Frame { mut element, close } = frame;
    match close {
        Close::Plain => element.into(),
        Close::Transparent => Node::Fragment(element.children),
        Close::CodeBlock => el("pre").child(element).into(),
        Close::Image => {
            let alt = Node::Fragment(std::mem::take(&mut element.children)).text_content();
            element.attr("alt", alt).into()
        }
        Close::TableHead => {
            let cells = std::mem::take(&mut element.children);
            element.child(el("tr").children(cells)).into()
        }
    }
}
