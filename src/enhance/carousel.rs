//! Horizontal carousels with edge cutoff indicators

use std::rc::Rc;
use std::time::Duration;

use super::{throttled_debounce, Enhancement, EnhancementScope, SetupContext};
use crate::dom::{Document, EventTarget, Handler, NodeId};

const MAX_DEBOUNCE_TIMES: u32 = 20;
const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// `.carousel-container` → toggles `show-left-cutoff` / `show-right-cutoff`
/// from the scroll position of its `.carousel-items-container`
pub struct Carousels;

impl Enhancement for Carousels {
    fn name(&self) -> &'static str {
        "carousels"
    }

    fn scope(&self) -> EnhancementScope {
        EnhancementScope::Subtree
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        let carousels = ctx.query_all(|d, n| d.has_class(n, "carousel-container"));

        for carousel in carousels {
            ctx.doc.add_class(carousel, "show-right-cutoff");

            let Some(items) = ctx
                .doc
                .query_first(carousel, |d, n| d.has_class(n, "carousel-items-container"))
            else {
                tracing::debug!("Carousel without items container, skipping");
                continue;
            };

            let update: Handler =
                Rc::new(move |doc: &mut Document| determine_side_cutoffs(doc, carousel, items));
            let rate_limited =
                throttled_debounce(Rc::clone(&update), MAX_DEBOUNCE_TIMES, DEBOUNCE_DELAY);

            ctx.listen(EventTarget::Node(items), "scroll", Rc::clone(&rate_limited));
            ctx.listen(EventTarget::Window, "resize", rate_limited);
            ctx.after_content_ready(move |doc| update(doc));
        }

        Ok(())
    }
}

/// Show the left cutoff when scrolled at all, the right one while content
/// remains past the visible edge
pub fn determine_side_cutoffs(doc: &mut Document, carousel: NodeId, items: NodeId) {
    let metrics = doc.metrics(items);

    if metrics.scroll_left != 0.0 {
        doc.add_class(carousel, "show-left-cutoff");
    } else {
        doc.remove_class(carousel, "show-left-cutoff");
    }

    if metrics.scroll_left.ceil() + metrics.client_width < metrics.scroll_width {
        doc.add_class(carousel, "show-right-cutoff");
    } else {
        doc.remove_class(carousel, "show-right-cutoff");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ListenerSet, Metrics};
    use crate::page::ReadyCallbacks;

    const CAROUSEL: &str = r#"<div class="carousel-container" id="c"><div class="carousel-items-container" id="i"><div>1</div><div>2</div></div></div>"#;

    fn setup(doc: &mut Document) -> (ReadyCallbacks, ListenerSet) {
        let mut ready = ReadyCallbacks::new();
        let mut listeners = ListenerSet::new();
        let root = doc.root();
        let mut ctx = SetupContext::new(doc, root, &mut ready, &mut listeners);
        Carousels.setup(&mut ctx).unwrap();
        (ready, listeners)
    }

    fn carousel_doc() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, CAROUSEL).unwrap();
        let c = doc.element_by_id("c").unwrap();
        let i = doc.element_by_id("i").unwrap();
        (doc, c, i)
    }

    #[test]
    fn test_setup_marks_right_cutoff_and_registers_listeners() {
        let (mut doc, c, i) = carousel_doc();
        let (ready, listeners) = setup(&mut doc);

        assert!(doc.has_class(c, "show-right-cutoff"));
        assert_eq!(ready.len(), 1);
        assert_eq!(listeners.len(), 2);
        assert_eq!(doc.listener_count(EventTarget::Node(i), "scroll"), 1);
        assert_eq!(doc.listener_count(EventTarget::Window, "resize"), 1);
    }

    #[test]
    fn test_cutoffs_follow_scroll_metrics() {
        let (mut doc, c, i) = carousel_doc();

        // Fits entirely: no cutoffs
        doc.set_metrics(i, Metrics { scroll_left: 0.0, client_width: 300.0, scroll_width: 300.0 });
        determine_side_cutoffs(&mut doc, c, i);
        assert!(!doc.has_class(c, "show-left-cutoff"));
        assert!(!doc.has_class(c, "show-right-cutoff"));

        // Scrolled to the middle: both
        doc.set_metrics(i, Metrics { scroll_left: 100.4, client_width: 300.0, scroll_width: 600.0 });
        determine_side_cutoffs(&mut doc, c, i);
        assert!(doc.has_class(c, "show-left-cutoff"));
        assert!(doc.has_class(c, "show-right-cutoff"));

        // Scrolled to the end (fractional scroll rounds up)
        doc.set_metrics(i, Metrics { scroll_left: 299.5, client_width: 300.0, scroll_width: 600.0 });
        determine_side_cutoffs(&mut doc, c, i);
        assert!(doc.has_class(c, "show-left-cutoff"));
        assert!(!doc.has_class(c, "show-right-cutoff"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_updates_after_debounce() {
        let (mut doc, c, i) = carousel_doc();
        let (mut ready, _listeners) = setup(&mut doc);
        doc.set_metrics(i, Metrics { scroll_left: 0.0, client_width: 300.0, scroll_width: 900.0 });
        ready.flush(&mut doc);
        assert!(!doc.has_class(c, "show-left-cutoff"));

        doc.set_metrics(i, Metrics { scroll_left: 50.0, client_width: 300.0, scroll_width: 900.0 });
        doc.dispatch(EventTarget::Node(i), "scroll");
        assert!(!doc.has_class(c, "show-left-cutoff"));

        doc.settle().await;
        assert!(doc.has_class(c, "show-left-cutoff"));
    }

    #[test]
    fn test_missing_items_container_is_skipped() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.set_inner_html(body, r#"<div class="carousel-container" id="c"></div>"#)
            .unwrap();
        let (ready, listeners) = setup(&mut doc);
        let c = doc.element_by_id("c").unwrap();
        assert!(doc.has_class(c, "show-right-cutoff"));
        assert!(ready.is_empty());
        assert!(listeners.is_empty());
    }
}
