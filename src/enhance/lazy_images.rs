//! Fade-in for lazily loaded images
//!
//! A headless document never fetches images, so "complete" means there is
//! nothing to load (no `src`). Everything else waits for the host to dispatch
//! `load` on the image node.

use std::rc::Rc;
use std::time::Duration;

use super::{Enhancement, EnhancementScope, SetupContext};
use crate::dom::{Document, EventTarget, NodeId};

const READY_DELAY: Duration = Duration::from_millis(1);
const CACHED_TRANSITION_DELAY: Duration = Duration::from_millis(1);
const LOADED_TRANSITION_DELAY: Duration = Duration::from_millis(400);

/// `img[loading=lazy]` → `cached` / `loaded`, then `finished-transition`
pub struct LazyImages;

fn is_complete(doc: &Document, image: NodeId) -> bool {
    doc.attr(image, "src").map_or(true, |src| src.trim().is_empty())
}

fn finish_transition_after(doc: &mut Document, image: NodeId, delay: Duration) {
    doc.set_timeout(delay, move |doc| doc.add_class(image, "finished-transition"));
}

impl Enhancement for LazyImages {
    fn name(&self) -> &'static str {
        "lazy-images"
    }

    fn scope(&self) -> EnhancementScope {
        EnhancementScope::Subtree
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        let images =
            ctx.query_all(|d, n| d.tag(n) == Some("img") && d.attr(n, "loading") == Some("lazy"));
        if images.is_empty() {
            return Ok(());
        }

        for &image in &images {
            ctx.listen(
                EventTarget::Node(image),
                "load",
                Rc::new(move |doc: &mut Document| {
                    if doc.has_class(image, "cached") || doc.has_class(image, "loaded") {
                        return;
                    }
                    doc.add_class(image, "loaded");
                    finish_transition_after(doc, image, LOADED_TRANSITION_DELAY);
                }),
            );
        }

        ctx.after_content_ready(move |doc| {
            doc.set_timeout(READY_DELAY, move |doc| {
                for image in images {
                    if is_complete(doc, image) {
                        doc.add_class(image, "cached");
                        finish_transition_after(doc, image, CACHED_TRANSITION_DELAY);
                    }
                }
            });
        });

        Ok(())
    }
}
