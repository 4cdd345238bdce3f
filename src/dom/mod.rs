//! In-memory document model
//!
//! An arena-backed DOM standing in for the browser document. It carries
//! everything the page bootstrap needs from a browser:
//!
//! - an element tree built from server-rendered HTML fragments (html5ever)
//! - attributes, class lists and inline style declarations
//! - layout metrics, which a headless host supplies instead of a layout engine
//! - event listeners with explicit attach/detach handles ([`events`])
//! - a timer queue for timeouts and animation frames ([`timers`])
//!
//! Nodes are never freed. A node removed from the tree keeps its id and is
//! simply no longer connected; [`Document::is_connected`] tells the two apart.

mod events;
mod parser;
mod serialize;
mod timers;

pub(crate) use events::Handler;
pub use events::{EventTarget, ListenerHandle, ListenerSet};
pub use timers::{TimerId, FRAME_INTERVAL};

/// Index of a node in the document arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Layout values a browser would compute; headless hosts set them explicitly
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub scroll_left: f64,
    pub client_width: f64,
    pub scroll_width: f64,
}

/// Element tag and attributes, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    metrics: Metrics,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            metrics: Metrics::default(),
        }
    }
}

/// A headless document: node tree, listeners and timers
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    listeners: events::EventListeners,
    timers: timers::TimerQueue,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only a `<body>` element
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Node::new(NodeData::Document)],
            root: NodeId(0),
            body: NodeId(0),
            listeners: events::EventListeners::default(),
            timers: timers::TimerQueue::default(),
        };
        let body = doc.create_element("body");
        doc.append_child(doc.root, body);
        doc.body = body;
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node creation and tree structure
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    pub(crate) fn create_comment(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Comment(text.to_string()))
    }

    /// Nodes ever allocated, connected or not
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(data));
        id
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    /// Element children only (text and comments skipped)
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.is_element(c))
    }

    /// Remove a node from its parent. The node and its subtree stay in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `node` as the next sibling of `reference`.
    /// Returns false when `reference` has no parent.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        self.detach(node);
        let siblings = &mut self.nodes[parent.0].children;
        let index = siblings
            .iter()
            .position(|&c| c == reference)
            .map(|i| i + 1)
            .unwrap_or(siblings.len());
        siblings.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
        true
    }

    /// Put `new` where `old` is. Returns false when `old` has no parent.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.parent(old) else {
            return false;
        };
        self.detach(new);
        if let Some(slot) = self.nodes[parent.0].children.iter_mut().find(|c| **c == old) {
            *slot = new;
        }
        self.nodes[old.0].parent = None;
        self.nodes[new.0].parent = Some(parent);
        self.drop_detached_listeners();
        true
    }

    fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    /// Replace the children of `id` with the parsed fragment
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) -> anyhow::Result<()> {
        let nodes = self.parse_fragment(html)?;
        self.clear_children(id);
        for node in nodes {
            self.append_child(id, node);
        }
        self.drop_detached_listeners();
        Ok(())
    }

    /// True when the node is reachable from the document root
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Text
    // ─────────────────────────────────────────────────────────────────────────

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Document | NodeData::Element(_) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        let node = self.create_text(text);
        self.append_child(id, node);
    }

    /// Overwrite the value of a text node; no-op for other node kinds
    pub fn set_node_value(&mut self, id: NodeId, value: &str) {
        if let NodeData::Text(text) = &mut self.nodes[id.0].data {
            *text = value.to_string();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attributes, classes, inline style
    // ─────────────────────────────────────────────────────────────────────────

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(n, _)| n != name);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// True when the element carries every class in `classes`
    pub fn has_classes(&self, id: NodeId, classes: &[&str]) -> bool {
        classes.iter().all(|c| self.has_class(id, c))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if !self.is_element(id) || self.has_class(id, class) {
            return;
        }
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {}", existing.trim(), class)
            }
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let value = self
            .attr(id, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "class", &value);
    }

    fn style_declarations(&self, id: NodeId) -> Vec<(String, String)> {
        split_declarations(self.attr(id, "style").unwrap_or_default())
            .into_iter()
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim();
                (!prop.is_empty()).then(|| (prop.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    fn write_style_declarations(&mut self, id: NodeId, decls: &[(String, String)]) {
        if decls.is_empty() {
            self.remove_attr(id, "style");
            return;
        }
        let value = decls
            .iter()
            .map(|(p, v)| format!("{}: {};", p, v))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "style", &value);
    }

    /// Inline style value for `prop`, including custom properties like `--cards-per-row`
    pub fn style(&self, id: NodeId, prop: &str) -> Option<String> {
        self.style_declarations(id)
            .into_iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v)
    }

    pub fn set_style(&mut self, id: NodeId, prop: &str, value: &str) {
        let mut decls = self.style_declarations(id);
        match decls.iter_mut().find(|(p, _)| p == prop) {
            Some((_, v)) => *v = value.to_string(),
            None => decls.push((prop.to_string(), value.to_string())),
        }
        self.write_style_declarations(id, &decls);
    }

    pub fn remove_style(&mut self, id: NodeId, prop: &str) {
        let mut decls = self.style_declarations(id);
        let before = decls.len();
        decls.retain(|(p, _)| p != prop);
        if decls.len() != before {
            self.write_style_declarations(id, &decls);
        }
    }

    pub fn metrics(&self, id: NodeId) -> Metrics {
        self.nodes[id.0].metrics
    }

    pub fn set_metrics(&mut self, id: NodeId, metrics: Metrics) {
        self.nodes[id.0].metrics = metrics;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// All nodes below `id` in document order, `id` itself excluded
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Elements below `root` matching `pred`, in document order
    pub fn query_all<F>(&self, root: NodeId, pred: F) -> Vec<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.descendants(root)
            .into_iter()
            .filter(|&n| self.is_element(n) && pred(self, n))
            .collect()
    }

    pub fn query_first<F>(&self, root: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.is_element(n) && pred(self, n))
    }

    /// Nearest inclusive ancestor element matching `pred`
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_element(node) && pred(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.query_first(self.root, |doc, n| doc.attr(n, "id") == Some(id))
    }
}

/// Split a style attribute on `;`, ignoring semicolons inside quotes or
/// parentheses such as `url('data:image/png;base64,...')`
fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with(html: &str) -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, html).unwrap();
        doc
    }

    #[test]
    fn test_parse_and_query_by_class() {
        let doc = doc_with(
            r#"<div class="widget"><ul class="list collapsible-container"><li>a</li><li>b</li></ul></div>"#,
        );
        let lists = doc.query_all(doc.root(), |d, n| {
            d.has_classes(n, &["list", "collapsible-container"])
        });
        assert_eq!(lists.len(), 1);
        assert_eq!(doc.element_children(lists[0]).len(), 2);
        assert_eq!(doc.text_content(lists[0]), "ab");
    }

    #[test]
    fn test_class_manipulation() {
        let mut doc = doc_with(r#"<div id="x" class="a  b"></div>"#);
        let x = doc.element_by_id("x").unwrap();
        doc.add_class(x, "c");
        doc.add_class(x, "a");
        assert_eq!(doc.attr(x, "class"), Some("a  b c"));
        doc.remove_class(x, "b");
        assert_eq!(doc.attr(x, "class"), Some("a c"));
        assert!(!doc.has_class(x, "b"));
    }

    #[test]
    fn test_inline_style_roundtrip() {
        let mut doc = doc_with(r#"<div id="g" style="--cards-per-row: 3"></div>"#);
        let g = doc.element_by_id("g").unwrap();
        assert_eq!(doc.style(g, "--cards-per-row").as_deref(), Some("3"));

        doc.set_style(g, "opacity", "0.5");
        assert_eq!(doc.attr(g, "style"), Some("--cards-per-row: 3; opacity: 0.5;"));

        doc.remove_style(g, "--cards-per-row");
        doc.remove_style(g, "opacity");
        assert_eq!(doc.attr(g, "style"), None);
    }

    #[test]
    fn test_inline_style_keeps_semicolons_inside_urls_and_quotes() {
        let mut doc = doc_with(
            r#"<div id="w" style="background-image: url('data:image/png;base64,AAAA'); font-family: &quot;a;b&quot;; color: red"></div>"#,
        );
        let w = doc.element_by_id("w").unwrap();
        assert_eq!(
            doc.style(w, "background-image").as_deref(),
            Some("url('data:image/png;base64,AAAA')")
        );
        assert_eq!(doc.style(w, "font-family").as_deref(), Some("\"a;b\""));

        doc.set_style(w, "opacity", "0.5");
        doc.remove_style(w, "opacity");
        assert_eq!(
            doc.attr(w, "style"),
            Some(r#"background-image: url('data:image/png;base64,AAAA'); font-family: "a;b"; color: red;"#)
        );
    }

    #[test]
    fn test_replace_with_and_connectivity() {
        let mut doc = doc_with(r#"<div id="old">x</div>"#);
        let old = doc.element_by_id("old").unwrap();
        let new = doc.parse_fragment(r#"<section id="new"></section>"#).unwrap()[0];
        assert!(!doc.is_connected(new));

        assert!(doc.replace_with(old, new));
        assert!(doc.is_connected(new));
        assert!(!doc.is_connected(old));
        assert_eq!(doc.element_by_id("old"), None);

        // Replacing a detached node does nothing
        let other = doc.create_element("p");
        assert!(!doc.replace_with(old, other));
    }

    #[test]
    fn test_closest_is_inclusive() {
        let doc = doc_with(r#"<div class="widget"><h2 class="title"><span id="s">t</span></h2></div>"#);
        let s = doc.element_by_id("s").unwrap();
        let widget = doc.closest(s, |d, n| d.has_class(n, "widget")).unwrap();
        assert_eq!(doc.tag(widget), Some("div"));
        assert_eq!(doc.closest(s, |d, n| d.tag(n) == Some("span")), Some(s));
    }

    #[test]
    fn test_insert_after() {
        let mut doc = doc_with(r#"<p id="a"></p><p id="c"></p>"#);
        let a = doc.element_by_id("a").unwrap();
        let b = doc.create_element("button");
        assert!(doc.insert_after(a, b));
        let body = doc.body();
        let tags: Vec<_> = doc
            .element_children(body)
            .into_iter()
            .map(|n| doc.tag(n).unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["p", "button", "p"]);
    }

    #[test]
    fn test_set_inner_html_serializes_back() {
        let mut doc = Document::new();
        let body = doc.body();
        let html = r#"<div class="card"><img src="a.png" loading="lazy"><span>a &amp; b</span></div>"#;
        doc.set_inner_html(body, html).unwrap();
        assert_eq!(doc.inner_html(body), html);
    }
}
