//! HTML serialization of document subtrees

use super::{Document, NodeData, NodeId};
use crate::util::escape_html;

/// Elements that never have an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text content is written verbatim
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Document {
    /// Markup of the node itself and everything below it
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out, false);
        out
    }

    /// Markup of the node's children
    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self
            .tag(id)
            .map(|tag| RAW_TEXT_ELEMENTS.contains(&tag))
            .unwrap_or(false);
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out, raw);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String, raw_text: bool) {
        match self.data(id) {
            NodeData::Document => out.push_str(&self.inner_html(id)),
            NodeData::Text(text) if raw_text => out.push_str(text),
            NodeData::Text(text) => out.push_str(&escape_html(text)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_and_raw_text_elements() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, "<br><style>a > b {}</style>").unwrap();
        assert_eq!(doc.inner_html(body), "<br><style>a > b {}</style>");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.set_attr(el, "title", "say \"hi\" & <bye>");
        assert_eq!(
            doc.outer_html(el),
            r#"<div title="say &quot;hi&quot; &amp; &lt;bye&gt;"></div>"#
        );
    }
}
