//! Tooltips for truncated text

use crate::dom::{Document, NodeId};
use crate::util::collapse_whitespace;

const TRUNCATE_CLASSES: [&str; 3] = ["text-truncate", "text-truncate-2-lines", "text-truncate-3-lines"];

fn is_truncated(doc: &Document, node: NodeId) -> bool {
    if TRUNCATE_CLASSES.iter().any(|c| doc.has_class(node, c)) {
        return true;
    }
    doc.has_class(node, "title")
        && doc
            .parent(node)
            .and_then(|p| doc.closest(p, |d, n| d.has_class(n, "single-line-titles")))
            .is_some()
}

/// Give every truncated element below `root` without a `title` attribute its
/// own text as title. Returns how many titles were set.
pub fn reveal_truncated_titles(doc: &mut Document, root: NodeId) -> usize {
    let elements = doc.query_all(root, |d, n| is_truncated(d, n) && !d.has_attr(n, "title"));
    for &element in &elements {
        let text = collapse_whitespace(doc.text_content(element).trim());
        doc.set_attr(element, "title", &text);
    }
    elements.len()
}
