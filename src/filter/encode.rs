//! Stage 6: serialize the tree and emit the page's document as a resource.
//!
//! A tree that contains a [`Node::DocumentType`] at top level is written as
//! HTML: void elements (`br`, `img`, `meta`, ...) close themselves and every
//! other element gets an explicit end tag. Anything else (feeds, sitemaps) is
//! written as XML, where every empty element closes itself.

use super::{Filter, FilterError, FilterOutput, PageContext};
use crate::node::{Element, Node};
use crate::resource::Resource;
use maud::Render;
use tracing::debug;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Html,
    Xml,
}

/// Serialize a finished document tree.
pub fn encode_document(tree: &Node) -> String {
    let syntax = if has_doctype(tree) {
        Syntax::Html
    } else {
        Syntax::Xml
    };
    let mut out = String::new();
    write_node(tree, syntax, &mut out);
    out
}

/// Serialize with HTML rules regardless of doctype, for markup that ends up
/// embedded as text (feed entry bodies).
pub fn encode_html(tree: &Node) -> String {
    let mut out = String::new();
    write_node(tree, Syntax::Html, &mut out);
    out
}

fn has_doctype(tree: &Node) -> bool {
    match tree {
        Node::DocumentType(_) => true,
        Node::Fragment(nodes) => nodes.iter().any(has_doctype),
        _ => false,
    }
}

fn write_node(node: &Node, syntax: Syntax, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, syntax, out),
        Node::Text(text) => text.as_str().render_to(out),
        Node::Raw(markup) => out.push_str(markup),
        Node::Fragment(nodes) => nodes.iter().for_each(|n| write_node(n, syntax, out)),
        Node::DocumentType(name) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push_str(">\n");
        }
    }
}

fn write_element(e: &Element, syntax: Syntax, out: &mut String) {
    out.push('<');
    out.push_str(&e.name);
    for (key, value) in &e.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        value.as_str().render_to(out);
        out.push('"');
    }

    let self_closing = match syntax {
        Syntax::Html => VOID_ELEMENTS.contains(&e.name.as_str()),
        Syntax::Xml => e.flat_children().is_empty(),
    };
    if self_closing {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &e.children {
        write_node(child, syntax, out);
    }
    out.push_str("</");
    out.push_str(&e.name);
    out.push('>');
}

pub struct EncodeFilter;

impl Filter for EncodeFilter {
    fn name(&self) -> &'static str {
        "encode"
    }

    fn apply(&self, tree: Node, ctx: &mut PageContext) -> Result<FilterOutput, FilterError> {
        let encoded = encode_document(&tree);
        let path = ctx.route.output_path();
        debug!(page = %ctx.label, path = %path.join("/"), bytes = encoded.len(), "encoded document");
        Ok(FilterOutput {
            tree,
            resources: vec![Resource::new(path, encoded)],
        })
    }
}
