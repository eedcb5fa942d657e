//! The host document tree.
//!
//! Nodes live in an arena owned by [`Document`] and are addressed by
//! [`NodeId`]. Nodes are never freed: a detached node simply has no parent.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};
use crate::property::Property;
use crate::selector::SelectorList;
use crate::template::{NodeTemplate, PageTemplate};

/// Index of a node inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

/// An element node: tag name plus content attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
}

impl Element {
    /// Lower-cased tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by canonical name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The root document node
    Document,
    /// An element
    Element(Element),
    /// A text node
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create `document > html > (head, body)`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            head: NodeId(0),
            body: NodeId(0),
        };
        let html = doc.insert(NodeKind::Element(Element::new("html")));
        let head = doc.insert(NodeKind::Element(Element::new("head")));
        let body = doc.insert(NodeKind::Element(Element::new("body")));
        doc.link(doc.root(), html);
        doc.link(html, head);
        doc.link(html, body);
        doc.head = head;
        doc.body = body;
        doc
    }

    /// Build a document whose `body` holds the template content.
    pub fn from_template(template: &PageTemplate) -> Result<Self> {
        let mut doc = Self::new();
        let body = doc.body;
        for node in &template.body {
            doc.instantiate(body, node)?;
        }
        Ok(doc)
    }

    fn instantiate(&mut self, parent: NodeId, template: &NodeTemplate) -> Result<()> {
        let node = match template {
            NodeTemplate::Text { text } => self.create_text_node(text),
            NodeTemplate::Element {
                tag,
                attributes,
                children,
            } => {
                let node = self.create_element(tag)?;
                for (name, value) in attributes {
                    self.set_attribute(node, name, value)?;
                }
                for child in children {
                    self.instantiate(node, child)?;
                }
                node
            }
        };
        self.append_child(parent, node)?;
        Ok(())
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `head` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `body` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the document node exists from the start.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> Result<NodeId> {
        if !is_valid_tag(tag) {
            return Err(DocumentError::InvalidTagName(tag.to_string()));
        }
        let id = self.insert(NodeKind::Element(Element::new(tag)));
        tracing::trace!(node = id.0, tag, "created element");
        Ok(id)
    }

    /// Create a detached text node.
    pub fn create_text_node(&mut self, data: &str) -> NodeId {
        self.insert(NodeKind::Text(data.to_string()))
    }

    /// Append `child` to `parent`, moving it out of its current parent.
    ///
    /// Returns `child`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        let parent_kind = &self.node(parent)?.kind;
        if matches!(parent_kind, NodeKind::Text(_)) {
            return Err(DocumentError::HierarchyRequest(
                "text nodes cannot have children".to_string(),
            ));
        }
        if matches!(self.node(child)?.kind, NodeKind::Document) {
            return Err(DocumentError::HierarchyRequest(
                "the document node cannot be inserted".to_string(),
            ));
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(DocumentError::HierarchyRequest(
                "a node cannot be appended to its own descendant".to_string(),
            ));
        }
        self.detach(child);
        self.link(parent, child);
        Ok(child)
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Children in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    /// Parent chain, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Pre-order traversal of the subtree below `id`, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root() || self.ancestors(id).any(|a| a == self.root())
    }

    /// Node kind.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    /// The element behind `id`, if it is one.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    /// Tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    /// First connected element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let selector = SelectorList::parse(selector)?;
        Ok(self.query(&selector))
    }

    /// Like [`Document::query_selector`] with a pre-parsed selector.
    pub fn query(&self, selector: &SelectorList) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&node| selector.matches(self, node))
    }

    /// Set a content attribute directly, bypassing the property allow-list.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(element) => {
                element
                    .attributes
                    .insert(name.to_ascii_lowercase(), value.to_string());
                Ok(())
            }
            _ => Err(DocumentError::NotAnElement(id)),
        }
    }

    /// Read a content attribute.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    /// Apply an allow-listed property.
    pub fn set_property(&mut self, id: NodeId, property: &Property, value: &str) -> Result<()> {
        match property {
            Property::TextContent => self.set_text_content(id, value),
            Property::Attribute(name) => self.set_attribute(id, name, value),
        }
    }

    /// Read an allow-listed property. `None` when unset.
    pub fn property(&self, id: NodeId, property: &Property) -> Option<String> {
        match property {
            Property::TextContent => self.text_content(id),
            Property::Attribute(name) => self.attribute(id, name).map(str::to_string),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        match self.kind(id)? {
            NodeKind::Text(data) => Some(data.clone()),
            NodeKind::Document => None,
            NodeKind::Element(_) => {
                let mut text = String::new();
                for node in self.descendants(id) {
                    if let Some(NodeKind::Text(data)) = self.kind(node) {
                        text.push_str(data);
                    }
                }
                Some(text)
            }
        }
    }

    /// Replace all children with a single text node, or none for `""`.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(data) => {
                *data = text.to_string();
                return Ok(());
            }
            NodeKind::Document => return Err(DocumentError::NotAnElement(id)),
            NodeKind::Element(_) => {}
        }
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text_node(text);
            self.link(id, node);
        }
        Ok(())
    }

    /// Serialize a subtree as HTML.
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    // Explicit stack: guests control tree depth.
    fn render_into(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![RenderFrame::Open(id)];
        while let Some(frame) = stack.pop() {
            let node = match frame {
                RenderFrame::Open(node) => node,
                RenderFrame::Close(tag) => {
                    let _ = write!(out, "</{}>", tag);
                    continue;
                }
            };
            match self.kind(node) {
                None => {}
                Some(NodeKind::Document) => {}
                Some(NodeKind::Text(data)) => out.push_str(&escape(data, false)),
                Some(NodeKind::Element(element)) => {
                    let _ = write!(out, "<{}", element.tag);
                    for (name, value) in element.attributes() {
                        let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
                    }
                    out.push('>');
                    stack.push(RenderFrame::Close(&element.tag));
                }
            }
            stack.extend(self.children(node).iter().rev().map(|&c| RenderFrame::Open(c)));
        }
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))
    }
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        }
    }
}

enum RenderFrame<'a> {
    Open(NodeId),
    Close(&'a str),
}

fn is_valid_tag(tag: &str) -> bool {
    let mut bytes = tag.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'-')
        }
        _ => false,
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_shape() {
        let doc = Document::new();
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
        assert_eq!(doc.tag_name(doc.head()), Some("head"));
        assert!(doc.is_connected(doc.body()));
        assert_eq!(
            doc.render(doc.root()),
            "<html><head></head><body></body></html>"
        );
    }

    #[test]
    fn test_create_element_validates_tag() {
        let mut doc = Document::new();
        let div = doc.create_element("DIV").unwrap();
        assert_eq!(doc.tag_name(div), Some("div"));
        assert!(doc.create_element("my-widget").is_ok());
        for bad in ["", "1div", "di v", "<b>"] {
            assert_eq!(
                doc.create_element(bad),
                Err(DocumentError::InvalidTagName(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_detached_nodes_are_not_queryable() {
        let mut doc = Document::new();
        let div = doc.create_element("div").unwrap();
        assert!(!doc.is_connected(div));
        assert_eq!(doc.query_selector("div").unwrap(), None);
        doc.append_child(doc.body(), div).unwrap();
        assert_eq!(doc.query_selector("div").unwrap(), Some(div));
    }

    #[test]
    fn test_append_child_moves_node() {
        let mut doc = Document::new();
        let a = doc.create_element("div").unwrap();
        let b = doc.create_element("div").unwrap();
        let span = doc.create_element("span").unwrap();
        doc.append_child(a, span).unwrap();
        doc.append_child(b, span).unwrap();
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.children(b), &[span]);
        assert_eq!(doc.parent(span), Some(b));
    }

    #[test]
    fn test_append_child_hierarchy_errors() {
        let mut doc = Document::new();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("div").unwrap();
        let text = doc.create_text_node("hi");
        doc.append_child(outer, inner).unwrap();

        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DocumentError::HierarchyRequest(_))
        ));
        assert!(matches!(
            doc.append_child(outer, outer),
            Err(DocumentError::HierarchyRequest(_))
        ));
        assert!(matches!(
            doc.append_child(text, inner),
            Err(DocumentError::HierarchyRequest(_))
        ));
        let root = doc.root();
        assert!(matches!(
            doc.append_child(outer, root),
            Err(DocumentError::HierarchyRequest(_))
        ));
        assert_eq!(
            doc.append_child(outer, NodeId(999)),
            Err(DocumentError::UnknownNode(NodeId(999)))
        );
    }

    #[test]
    fn test_text_content_roundtrip() {
        let mut doc = Document::new();
        let p = doc.create_element("p").unwrap();
        let hello = doc.create_text_node("hello ");
        let b = doc.create_element("b").unwrap();
        let world = doc.create_text_node("world");
        doc.append_child(p, hello).unwrap();
        doc.append_child(p, b).unwrap();
        doc.append_child(b, world).unwrap();
        assert_eq!(doc.text_content(p).as_deref(), Some("hello world"));

        doc.set_text_content(p, "replaced").unwrap();
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p).as_deref(), Some("replaced"));

        doc.set_text_content(p, "").unwrap();
        assert!(doc.children(p).is_empty());
        assert_eq!(doc.text_content(p).as_deref(), Some(""));
    }

    #[test]
    fn test_properties() {
        let mut doc = Document::new();
        let input = doc.create_element("input").unwrap();
        let value: Property = "value".parse().unwrap();
        assert_eq!(doc.property(input, &value), None);
        doc.set_property(input, &value, "42").unwrap();
        assert_eq!(doc.property(input, &value).as_deref(), Some("42"));

        let text = doc.create_text_node("t");
        assert_eq!(
            doc.set_property(text, &value, "x"),
            Err(DocumentError::NotAnElement(text))
        );
        assert_eq!(doc.property(text, &value), None);
        assert_eq!(doc.property(text, &Property::TextContent).as_deref(), Some("t"));
    }

    #[test]
    fn test_render_escapes() {
        let mut doc = Document::new();
        let a = doc.create_element("a").unwrap();
        doc.set_attribute(a, "title", "\"<x>\"").unwrap();
        doc.set_text_content(a, "1 < 2 & 3").unwrap();
        assert_eq!(
            doc.render(a),
            "<a title=\"&quot;&lt;x&gt;&quot;\">1 &lt; 2 &amp; 3</a>"
        );
    }

    #[test]
    fn test_render_nesting_and_siblings() {
        let mut doc = Document::new();
        let ul = doc.create_element("ul").unwrap();
        for label in ["a", "b"] {
            let li = doc.create_element("li").unwrap();
            let text = doc.create_text_node(label);
            doc.append_child(li, text).unwrap();
            doc.append_child(ul, li).unwrap();
        }
        doc.append_child(doc.body(), ul).unwrap();
        assert_eq!(
            doc.render(doc.root()),
            "<html><head></head><body><ul><li>a</li><li>b</li></ul></body></html>"
        );
    }

    #[test]
    fn test_render_very_deep_tree() {
        const DEPTH: usize = 200_000;
        let mut doc = Document::new();

        // bottom-up so each append only walks a detached parent
        let mut top = doc.create_text_node("leaf");
        for _ in 0..DEPTH {
            let div = doc.create_element("div").unwrap();
            doc.append_child(div, top).unwrap();
            top = div;
        }
        doc.append_child(doc.body(), top).unwrap();

        let html = doc.render(doc.root());
        assert!(html.starts_with("<html><head></head><body><div><div>"));
        assert!(html.ends_with("leaf</div></div></body></html>"));
        assert_eq!(html.matches("<div>").count(), DEPTH);
        assert_eq!(html.matches("</div>").count(), DEPTH);
    }

    #[test]
    fn test_from_template() {
        let template: PageTemplate = serde_json::from_str(
            r#"{"body": [
                {"tag": "textarea", "attributes": {"id": "code"}},
                {"tag": "button", "attributes": {"id": "run"}, "children": [{"text": "Run"}]}
            ]}"#,
        )
        .unwrap();
        let doc = Document::from_template(&template).unwrap();
        let run = doc.query_selector("#run").unwrap().unwrap();
        assert_eq!(doc.text_content(run).as_deref(), Some("Run"));
        assert!(doc.query_selector("textarea#code").unwrap().is_some());
    }
}
