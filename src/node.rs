//! Document tree: the structural, serialization-agnostic form of page markup.
//!
//! Pages build a [`Node`] tree, every filter in the pipeline rewrites it, and
//! only the final encoding stage turns it into bytes. Nothing here performs I/O,
//! so tree construction is a pure function of its inputs and can be tested on
//! fragments in isolation.
//!
//! ## Variants
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`Node::Element`] | Tag name, ordered attributes, ordered children |
//! | [`Node::Text`] | Text content, escaped when serialized |
//! | [`Node::Raw`] | Pre-escaped markup, copied verbatim |
//! | [`Node::Fragment`] | A sequence of nodes with no wrapping tag |
//! | [`Node::DocumentType`] | A single `<!DOCTYPE …>` declaration |
//!
//! Fragments are transparent: traversal and serialization step straight through
//! them, they never act as a boundary.
//!
//! ## Placeholders
//!
//! Two reserved element names carry work for later pipeline stages:
//!
//! - [`INLINE_TAG`] (`x-inline src="…"`) asks the inline filter to splice in a
//!   file from the resource root.
//! - [`MARKDOWN_TAG`] (`x-markdown`) marks its text content as markdown source
//!   for the markdown filter.

use std::convert::Infallible;

/// Element name of an inline-file placeholder.
pub const INLINE_TAG: &str = "x-inline";

/// Element name wrapping markdown source text.
pub const MARKDOWN_TAG: &str = "x-markdown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Raw(String),
    Fragment(Vec<Node>),
    DocumentType(String),
}

/// A markup element. Attribute order is insertion order; setting an existing
/// key replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// Result of visiting an element during [`Node::try_rewrite`].
pub enum Visit {
    /// Put this node in the element's place and do not descend into it.
    Replace(Node),
    /// Keep the (possibly modified) element and rewrite its children.
    Descend(Element),
}

/// Start building an element.
pub fn el(name: impl Into<String>) -> Element {
    Element::new(name)
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Add the attribute only when `value` is `Some`.
    pub fn attr_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I, N>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Whether the space-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Children with fragments flattened away.
    pub fn flat_children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for child in &self.children {
            child.push_flattened(&mut out);
        }
        out
    }
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    pub fn raw(markup: impl Into<String>) -> Self {
        Node::Raw(markup.into())
    }

    pub fn fragment<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        Node::Fragment(nodes.into_iter().map(Into::into).collect())
    }

    pub fn doctype(name: impl Into<String>) -> Self {
        Node::DocumentType(name.into())
    }

    /// An empty fragment.
    pub fn empty() -> Self {
        Node::Fragment(Vec::new())
    }

    /// Placeholder asking the inline filter for `path` under the resource root.
    pub fn inline(path: impl Into<String>) -> Self {
        el(INLINE_TAG).attr("src", path).into()
    }

    /// Markdown source, parsed by the markdown filter.
    pub fn markdown(source: impl Into<String>) -> Self {
        el(MARKDOWN_TAG).child(Node::text(source)).into()
    }

    /// Markdown source assembled from arbitrary nodes (usually inline placeholders).
    pub fn markdown_of<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        el(MARKDOWN_TAG).children(nodes).into()
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    fn push_flattened<'a>(&'a self, out: &mut Vec<&'a Node>) {
        match self {
            Node::Fragment(nodes) => {
                for n in nodes {
                    n.push_flattened(out);
                }
            }
            other => out.push(other),
        }
    }

    /// This node as a flat list: fragments (nested or not) are dissolved.
    pub fn flatten(self) -> Vec<Node> {
        match self {
            Node::Fragment(nodes) => nodes.into_iter().flat_map(Node::flatten).collect(),
            other => vec![other],
        }
    }

    /// Concatenated text of every `Text` and `Raw` node below this one.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) | Node::Raw(t) => out.push_str(t),
            Node::Element(e) => e.children.iter().for_each(|c| c.collect_text(out)),
            Node::Fragment(nodes) => nodes.iter().for_each(|c| c.collect_text(out)),
            Node::DocumentType(_) => {}
        }
    }

    /// Visit every element depth-first, parents before children.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        match self {
            Node::Element(e) => {
                f(e);
                e.children.iter().for_each(|c| c.walk(f));
            }
            Node::Fragment(nodes) => nodes.iter().for_each(|c| c.walk(f)),
            Node::Text(_) | Node::Raw(_) | Node::DocumentType(_) => {}
        }
    }

    /// Rewrite the tree top-down, one element at a time.
    ///
    /// `f` sees each element before its children. Returning [`Visit::Replace`]
    /// substitutes a node and skips its subtree; [`Visit::Descend`] keeps the
    /// element and continues into its children. The first error aborts.
    pub fn try_rewrite<E>(
        self,
        f: &mut impl FnMut(Element) -> Result<Visit, E>,
    ) -> Result<Node, E> {
        match self {
            Node::Element(e) => match f(e)? {
                Visit::Replace(node) => Ok(node),
                Visit::Descend(mut e) => {
                    e.children = e
                        .children
                        .into_iter()
                        .map(|c| c.try_rewrite(f))
                        .collect::<Result<_, E>>()?;
                    Ok(Node::Element(e))
                }
            },
            Node::Fragment(nodes) => Ok(Node::Fragment(
                nodes
                    .into_iter()
                    .map(|c| c.try_rewrite(f))
                    .collect::<Result<_, E>>()?,
            )),
            leaf => Ok(leaf),
        }
    }

    /// Infallible [`try_rewrite`](Self::try_rewrite).
    pub fn rewrite(self, f: &mut impl FnMut(Element) -> Visit) -> Node {
        match self.try_rewrite(&mut |e| Ok::<_, Infallible>(f(e))) {
            Ok(node) => node,
            Err(never) => match never {},
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::Fragment(nodes)
    }
}
