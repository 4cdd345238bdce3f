//! In-place widget refresh
//!
//! Clicking a `.widget-refresh-title[data-widget-id]` inside a `.widget`
//! refetches that one widget and swaps it in without touching the rest of the
//! page.
//!
//! ```text
//! begin    → lock the widget (opacity 0.5, no pointer events)
//! fetch    → GET {base}/api/widgets/{id}/   (no DOM access, no timeout)
//! complete → success: replace node, run subtree setups on it, flush ready
//!            failure: restore the previous style attribute verbatim, log
//! ```
//!
//! The split lets several refreshes be in flight at once. The lock is
//! advisory: nothing stops a second click on the same widget.

use std::fmt;
use std::rc::Rc;

use crate::dom::{Document, ListenerSet, NodeId};
use crate::enhance::{run_setups, EnhancementRegistry, SetupContext, SetupRun};
use crate::fetch::{PageDescriptor, Transport, TransportError};
use crate::page::{Page, ReadyCallbacks};

const LOCKED_OPACITY: &str = "0.5";

/// Which widget a click refers to. Lives for one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDescriptor {
    pub widget_id: String,
    /// The enclosing `.widget` element at click time
    pub element: NodeId,
}

impl WidgetDescriptor {
    /// Resolve a click target. `None` unless it sits inside a refresh trigger
    /// with a non-empty `data-widget-id` that is itself inside a `.widget`.
    pub fn from_trigger(doc: &Document, target: NodeId) -> Option<Self> {
        let trigger = doc.closest(target, |d, n| d.has_class(n, "widget-refresh-title"))?;
        let widget_id = doc.attr(trigger, "data-widget-id")?.trim();
        if widget_id.is_empty() {
            return None;
        }
        let element = doc.closest(trigger, |d, n| d.has_class(n, "widget"))?;

        Some(Self {
            widget_id: widget_id.to_string(),
            element,
        })
    }
}

/// Why a widget refresh failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetRefreshError {
    /// The server answered with a non-2xx status
    Status(u16),
    /// No response was obtained
    Transport(TransportError),
    /// The response had no element to swap in
    EmptyFragment,
    /// The response could not be parsed
    Parse(String),
}

impl fmt::Display for WidgetRefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "Failed to refresh widget: {}", status),
            Self::Transport(e) => write!(f, "Error refreshing widget: {}", e),
            Self::EmptyFragment => write!(f, "Widget response contained no element"),
            Self::Parse(msg) => write!(f, "Failed to parse widget response: {}", msg),
        }
    }
}

impl std::error::Error for WidgetRefreshError {}

impl From<TransportError> for WidgetRefreshError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// A locked widget waiting for its response
#[derive(Debug)]
pub struct PendingRefresh {
    pub widget: WidgetDescriptor,
    previous_style: Option<String>,
}

/// How a refresh ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The click was not on a refresh trigger
    Ignored,
    /// The widget was swapped for `element` and its subtree set up
    Replaced {
        widget_id: String,
        element: NodeId,
        setups: SetupRun,
    },
    /// Nothing was replaced and the lock was lifted
    Failed {
        widget_id: String,
        error: WidgetRefreshError,
    },
    /// The old widget left the document before the response arrived
    Dropped { widget_id: String },
}

/// Refreshes widgets over a [`Transport`]
pub struct WidgetRefreshController<T> {
    transport: T,
    page: PageDescriptor,
    registry: Rc<EnhancementRegistry>,
}

impl<T: Transport> WidgetRefreshController<T> {
    pub fn new(transport: T, page: PageDescriptor, registry: Rc<EnhancementRegistry>) -> Self {
        Self {
            transport,
            page,
            registry,
        }
    }

    /// Full refresh for a click on `target`
    pub async fn handle_click(&self, page: &mut Page, target: NodeId) -> RefreshOutcome {
        let Some(pending) = self.begin(page, target) else {
            return RefreshOutcome::Ignored;
        };
        let response = self.fetch(&pending).await;
        self.complete(page, pending, response)
    }

    /// Refresh the widget whose trigger carries `widget_id`
    pub async fn refresh(&self, page: &mut Page, widget_id: &str) -> RefreshOutcome {
        let trigger = page.document().query_first(page.document().root(), |d, n| {
            d.has_class(n, "widget-refresh-title") && d.attr(n, "data-widget-id") == Some(widget_id)
        });
        match trigger {
            Some(trigger) => self.handle_click(page, trigger).await,
            None => {
                tracing::warn!(widget_id, "No refresh trigger for widget");
                RefreshOutcome::Ignored
            }
        }
    }

    /// Resolve the click and lock the widget
    pub fn begin(&self, page: &mut Page, target: NodeId) -> Option<PendingRefresh> {
        let doc = page.document_mut();
        let widget = WidgetDescriptor::from_trigger(doc, target)?;

        let pending = PendingRefresh {
            previous_style: doc.attr(widget.element, "style").map(str::to_string),
            widget,
        };
        doc.set_style(pending.widget.element, "opacity", LOCKED_OPACITY);
        doc.set_style(pending.widget.element, "pointer-events", "none");

        tracing::debug!(widget_id = %pending.widget.widget_id, "Refreshing widget");
        Some(pending)
    }

    /// Request the widget's fresh markup
    pub async fn fetch(&self, pending: &PendingRefresh) -> Result<String, WidgetRefreshError> {
        let path = self.page.widget_path(&pending.widget.widget_id);
        let response = self.transport.get(&path, Some("text/html")).await?;
        if !response.is_success() {
            return Err(WidgetRefreshError::Status(response.status));
        }
        Ok(response.body)
    }

    /// Swap the response in, or lift the lock on failure
    pub fn complete(
        &self,
        page: &mut Page,
        pending: PendingRefresh,
        response: Result<String, WidgetRefreshError>,
    ) -> RefreshOutcome {
        let widget_id = pending.widget.widget_id.clone();
        let old = pending.widget.element;

        if !page.document().is_connected(old) {
            tracing::debug!(widget_id = %widget_id, "Widget left the page before its refresh landed");
            return RefreshOutcome::Dropped { widget_id };
        }

        let replacement = response.and_then(|html| first_element(page.document_mut(), &html));
        let new = match replacement {
            Ok(new) => new,
            Err(error) => {
                tracing::error!(widget_id = %widget_id, "{}", error);
                unlock(page.document_mut(), &pending);
                return RefreshOutcome::Failed { widget_id, error };
            }
        };

        page.document_mut().replace_with(old, new);

        let mut ready = ReadyCallbacks::new();
        let mut listeners = ListenerSet::new();
        let setups = {
            let mut ctx = SetupContext::new(page.document_mut(), new, &mut ready, &mut listeners);
            run_setups(self.registry.subtree(), &mut ctx)
        };
        ready.flush(page.document_mut());
        let released = page.adopt_widget_listeners(&widget_id, listeners);

        tracing::debug!(
            widget_id = %widget_id,
            setups = setups.completed,
            released,
            "Widget refreshed"
        );
        RefreshOutcome::Replaced {
            widget_id,
            element: new,
            setups,
        }
    }
}

/// Parse `html` and return its first element, detached
fn first_element(doc: &mut Document, html: &str) -> Result<NodeId, WidgetRefreshError> {
    let nodes = doc
        .parse_fragment(html)
        .map_err(|e| WidgetRefreshError::Parse(format!("{:#}", e)))?;
    nodes
        .into_iter()
        .find(|&n| doc.is_element(n))
        .ok_or(WidgetRefreshError::EmptyFragment)
}

fn unlock(doc: &mut Document, pending: &PendingRefresh) {
    let element = pending.widget.element;
    match &pending.previous_style {
        Some(style) => doc.set_attr(element, "style", style),
        None => doc.remove_attr(element, "style"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::EventTarget;
    use crate::enhance::EnhancementScope;
    use crate::fetch::transport::testing::{Reply, ScriptedTransport};
    use std::cell::{Cell, RefCell};

    const PAGE: &str = r#"<div class="widget" id="w1" style="opacity: 0.9;"><h2 class="widget-refresh-title" data-widget-id="1"><span id="t1">News</span></h2><p>old</p></div><div class="widget" id="w2"><h2 class="widget-refresh-title" data-widget-id="2">Weather</h2></div><p id="outside">x</p>"#;

    const FRESH: &str = r#"<div class="widget" id="w1-new"><h2 class="widget-refresh-title" data-widget-id="1">News</h2><ul class="list collapsible-container" data-collapse-after="1"><li>a</li><li>b</li></ul></div>"#;

    fn loaded_page(registry: &EnhancementRegistry) -> Page {
        let mut page = Page::new();
        page.apply(PAGE, registry).unwrap();
        page
    }

    fn controller<'t>(
        transport: &'t ScriptedTransport,
        registry: &Rc<EnhancementRegistry>,
    ) -> WidgetRefreshController<&'t ScriptedTransport> {
        WidgetRefreshController::new(transport, PageDescriptor::new("home", "/dash"), Rc::clone(registry))
    }

    fn by_id(page: &Page, id: &str) -> NodeId {
        page.document().element_by_id(id).unwrap()
    }

    #[test]
    fn test_descriptor_from_trigger() {
        let page = loaded_page(&EnhancementRegistry::new());
        let doc = page.document();

        let descriptor = WidgetDescriptor::from_trigger(doc, by_id(&page, "t1")).unwrap();
        assert_eq!(descriptor.widget_id, "1");
        assert_eq!(descriptor.element, by_id(&page, "w1"));

        assert_eq!(WidgetDescriptor::from_trigger(doc, by_id(&page, "outside")), None);
    }

    #[tokio::test]
    async fn test_success_replaces_widget_and_runs_subtree_setups() {
        let page_setup_runs = Rc::new(Cell::new(0));
        let widget_setup_roots = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EnhancementRegistry::standard();
        for name in ["popovers", "masonry"] {
            let roots = Rc::clone(&widget_setup_roots);
            registry.register_fn(name, EnhancementScope::Subtree, move |ctx| {
                roots.borrow_mut().push((name, ctx.root()));
                Ok(())
            });
        }
        for name in ["search-box", "clocks", "calendar", "todo"] {
            let runs = Rc::clone(&page_setup_runs);
            registry.register_fn(name, EnhancementScope::Page, move |_| {
                runs.set(runs.get() + 1);
                Ok(())
            });
        }
        let registry = Rc::new(registry);

        let mut page = loaded_page(&registry);
        assert_eq!(page_setup_runs.get(), 4);
        widget_setup_roots.borrow_mut().clear();
        let old = by_id(&page, "w1");
        let t1 = by_id(&page, "t1");
        let transport = ScriptedTransport::new([Reply::ok(FRESH)]);

        let outcome = controller(&transport, &registry).handle_click(&mut page, t1).await;

        let RefreshOutcome::Replaced { widget_id, element, setups } = outcome else {
            panic!("expected replacement, got {:?}", outcome);
        };
        assert_eq!(widget_id, "1");
        assert_eq!(element, by_id(&page, "w1-new"));
        assert_eq!(setups.completed, registry.subtree().count());
        assert!(!page.document().is_connected(old));

        // Subtree setups ran against the new node, page-level ones did not
        assert_eq!(page_setup_runs.get(), 4);
        assert_eq!(
            *widget_setup_roots.borrow(),
            vec![("popovers", element), ("masonry", element)]
        );
        let buttons = page
            .document()
            .query_all(element, |d, n| d.has_class(n, "expand-toggle-button"));
        assert_eq!(buttons.len(), 1);

        assert_eq!(transport.paths(), vec!["/dash/api/widgets/1/"]);
        assert_eq!(transport.accepts(), vec![Some("text/html".to_string())]);
    }

    #[tokio::test]
    async fn test_http_error_keeps_widget_and_restores_lock() {
        let setup_runs = Rc::new(Cell::new(0));
        let mut registry = EnhancementRegistry::new();
        let runs = Rc::clone(&setup_runs);
        registry.register_fn("counter", EnhancementScope::Subtree, move |_| {
            runs.set(runs.get() + 1);
            Ok(())
        });
        let registry = Rc::new(registry);

        let mut page = loaded_page(&registry);
        let before = page.content_html();
        let t1 = by_id(&page, "t1");
        let transport = ScriptedTransport::new([Reply::status(500)]);

        let outcome = controller(&transport, &registry).handle_click(&mut page, t1).await;

        assert_eq!(
            outcome,
            RefreshOutcome::Failed {
                widget_id: "1".to_string(),
                error: WidgetRefreshError::Status(500)
            }
        );
        let w1 = by_id(&page, "w1");
        assert_eq!(page.document().style(w1, "opacity").as_deref(), Some("0.9"));
        assert_eq!(page.document().style(w1, "pointer-events"), None);
        assert_eq!(page.content_html(), before);
        assert_eq!(setup_runs.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_restores_style_attribute_verbatim() {
        let style = "background-image: url('data:image/png;base64,AAAA'); color: red";
        let registry = Rc::new(EnhancementRegistry::new());
        let mut page = Page::new();
        let html = format!(
            r#"<div class="widget" id="w" style="{}"><h2 class="widget-refresh-title" data-widget-id="7" id="t">T</h2></div>"#,
            style
        );
        page.apply(&html, &registry).unwrap();
        let t = by_id(&page, "t");
        let transport = ScriptedTransport::new([Reply::status(503)]);

        let outcome = controller(&transport, &registry).handle_click(&mut page, t).await;

        assert!(matches!(outcome, RefreshOutcome::Failed { .. }));
        let w = by_id(&page, "w");
        assert_eq!(page.document().attr(w, "style"), Some(style));
    }

    #[tokio::test]
    async fn test_transport_error_and_empty_fragment_lift_lock() {
        let registry = Rc::new(EnhancementRegistry::standard());
        let mut page = loaded_page(&registry);
        let transport = ScriptedTransport::new([
            Reply::Fail(TransportError::Network("connection refused".into())),
            Reply::ok("   just text, no element "),
        ]);
        let controller = controller(&transport, &registry);

        for expected in [
            WidgetRefreshError::Transport(TransportError::Network("connection refused".into())),
            WidgetRefreshError::EmptyFragment,
        ] {
            let outcome = controller.refresh(&mut page, "2").await;
            let RefreshOutcome::Failed { error, .. } = outcome else {
                panic!("expected failure, got {:?}", outcome);
            };
            assert_eq!(error, expected);

            let w2 = by_id(&page, "w2");
            assert_eq!(page.document().attr(w2, "style"), None);
        }
    }

    #[tokio::test]
    async fn test_begin_locks_widget() {
        let registry = Rc::new(EnhancementRegistry::new());
        let mut page = loaded_page(&registry);
        let transport = ScriptedTransport::new([]);
        let controller = controller(&transport, &registry);

        let t1 = by_id(&page, "t1");
        let pending = controller.begin(&mut page, t1).unwrap();
        let w1 = pending.widget.element;
        assert_eq!(page.document().style(w1, "opacity").as_deref(), Some("0.5"));
        assert_eq!(page.document().style(w1, "pointer-events").as_deref(), Some("none"));

        let outside = by_id(&page, "outside");
        assert!(controller.begin(&mut page, outside).is_none());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_response_for_detached_widget_is_dropped() {
        let registry = Rc::new(EnhancementRegistry::standard());
        let mut page = loaded_page(&registry);
        let transport = ScriptedTransport::new([Reply::ok(FRESH)]);
        let controller = controller(&transport, &registry);

        let t1 = by_id(&page, "t1");
        let pending = controller.begin(&mut page, t1).unwrap();
        let response = controller.fetch(&pending).await;

        // A full re-apply lands while the widget request is in flight
        page.apply(PAGE, &registry).unwrap();
        let passes = page.passes();

        let outcome = controller.complete(&mut page, pending, response);
        assert_eq!(outcome, RefreshOutcome::Dropped { widget_id: "1".to_string() });
        assert_eq!(page.document().element_by_id("w1-new"), None);
        assert_eq!(page.passes(), passes);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes() {
        let registry = Rc::new(EnhancementRegistry::standard());
        let mut page = loaded_page(&registry);
        let transport = ScriptedTransport::new([
            Reply::ok(FRESH),
            Reply::ok(r#"<div class="widget" id="w2-new"></div>"#),
        ]);
        let controller = controller(&transport, &registry);

        let t1 = by_id(&page, "t1");
        let first = controller.begin(&mut page, t1).unwrap();
        let w2 = by_id(&page, "w2");
        let trigger_2 = page
            .document()
            .query_first(w2, |d, n| d.has_class(n, "widget-refresh-title"))
            .unwrap();
        let second = controller.begin(&mut page, trigger_2).unwrap();

        let (r1, r2) = tokio::join!(controller.fetch(&first), controller.fetch(&second));
        // Responses land out of order
        controller.complete(&mut page, second, r2);
        controller.complete(&mut page, first, r1);

        assert!(page.document().element_by_id("w1-new").is_some());
        assert!(page.document().element_by_id("w2-new").is_some());
        assert_eq!(page.document().element_by_id("w1"), None);
    }

    #[tokio::test]
    async fn test_repeated_refresh_releases_previous_listeners() {
        let registry = Rc::new(EnhancementRegistry::standard());
        let mut page = loaded_page(&registry);
        let carousel = r#"<div class="widget" id="wc"><h2 class="widget-refresh-title" data-widget-id="1">C</h2><div class="carousel-container"><div class="carousel-items-container"></div></div></div>"#;
        let transport = ScriptedTransport::new([Reply::ok(carousel), Reply::ok(carousel)]);
        let controller = controller(&transport, &registry);

        controller.refresh(&mut page, "1").await;
        assert_eq!(page.document().listener_count(EventTarget::Window, "resize"), 1);
        controller.refresh(&mut page, "1").await;
        assert_eq!(page.document().listener_count(EventTarget::Window, "resize"), 1);

        // A full pass releases widget-owned listeners too
        page.apply("<p></p>", &registry).unwrap();
        assert_eq!(page.document().listener_count(EventTarget::Window, "resize"), 0);
    }
}
