//! HTML fragment parsing using html5ever
//!
//! Fragments are parsed as the body of a full document so that elements like
//! `<style>` or `<script>` at the start of a fragment stay where they are
//! instead of moving into `<head>`. The rcdom tree is then copied into the
//! document arena as detached nodes.

use anyhow::{anyhow, Context, Result};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use super::{Document, NodeId};

impl Document {
    /// Parse `html` into detached top-level nodes, in source order
    pub fn parse_fragment(&mut self, html: &str) -> Result<Vec<NodeId>> {
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{}</body></html>", html);
        let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut wrapped.as_bytes())
            .context("Failed to parse HTML fragment")?;

        let body = find_body(&dom.document).ok_or_else(|| anyhow!("Parsed fragment has no body"))?;

        let mut nodes = Vec::new();
        for child in body.children.borrow().iter() {
            if let Some(id) = self.import_node(child) {
                nodes.push(id);
            }
        }
        Ok(nodes)
    }

    fn import_node(&mut self, handle: &Handle) -> Option<NodeId> {
        match &handle.data {
            RcNodeData::Element { name, attrs, .. } => {
                let node = self.create_element(&name.local);
                for attr in attrs.borrow().iter() {
                    self.set_attr(node, &attr.name.local, &attr.value);
                }
                for child in handle.children.borrow().iter() {
                    if let Some(child_id) = self.import_node(child) {
                        self.append_child(node, child_id);
                    }
                }
                Some(node)
            }
            RcNodeData::Text { contents } => Some(self.create_text(&contents.borrow())),
            RcNodeData::Comment { contents } => Some(self.create_comment(contents)),
            // Doctype and processing instructions have no place in a fragment
            _ => None,
        }
    }
}

fn find_body(handle: &Handle) -> Option<Handle> {
    if let RcNodeData::Element { name, .. } = &handle.data {
        if &*name.local == "body" {
            return Some(handle.clone());
        }
    }
    handle.children.borrow().iter().find_map(find_body)
}
