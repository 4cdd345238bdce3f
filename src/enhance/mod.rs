//! Enhancement modules and their registry
//!
//! An enhancement wires interactive behavior onto freshly applied content:
//! classes, listeners, timers, ready callbacks. Enhancements are resolved once
//! into an [`EnhancementRegistry`] and run in registration order after every
//! apply pass.
//!
//! # Scopes
//!
//! ```text
//! Page     → page-level singleton; runs only on full page passes
//! Subtree  → safe to run against any subtree; also runs on widget refresh
//! ```
//!
//! Setup is synchronous. Anything that needs a settled DOM goes through
//! [`SetupContext::after_content_ready`]; anything that needs to wait goes
//! through the document's timer queue.

pub mod carousel;
pub mod collapsible;
pub mod lazy_images;
pub mod relative_time;
pub mod titles;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::dom::{Document, EventTarget, Handler, ListenerSet, NodeId, TimerId};
use crate::page::ReadyCallbacks;

pub use carousel::Carousels;
pub use collapsible::{CollapsibleGrids, CollapsibleLists};
pub use lazy_images::LazyImages;
pub use relative_time::RelativeTime;

/// Where an enhancement may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementScope {
    /// Page-level singleton, full passes only
    Page,
    /// Subtree-safe, also re-run on refreshed widgets
    Subtree,
}

impl EnhancementScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Subtree => "subtree",
        }
    }
}

/// Everything a setup may touch during one pass
pub struct SetupContext<'a> {
    pub doc: &'a mut Document,
    root: NodeId,
    ready: &'a mut ReadyCallbacks,
    listeners: &'a mut ListenerSet,
}

impl<'a> SetupContext<'a> {
    pub fn new(
        doc: &'a mut Document,
        root: NodeId,
        ready: &'a mut ReadyCallbacks,
        listeners: &'a mut ListenerSet,
    ) -> Self {
        Self {
            doc,
            root,
            ready,
            listeners,
        }
    }

    /// Root of the subtree this pass covers
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Elements below the root matching `pred` (root excluded)
    pub fn query_all<F>(&self, pred: F) -> Vec<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.doc.query_all(self.root, pred)
    }

    /// Run `callback` once this pass's setups have all finished
    pub fn after_content_ready<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Document) + 'static,
    {
        self.ready.push(callback);
    }

    /// Attach a listener owned by this pass. It is released when the content
    /// it was set up for is replaced.
    pub fn listen(&mut self, target: EventTarget, event: &str, handler: Handler) {
        let handle = self.doc.add_shared_listener(target, event, handler);
        self.listeners.push(handle);
    }
}

/// One setup entry point
pub trait Enhancement {
    /// Short name for logging
    fn name(&self) -> &'static str;

    fn scope(&self) -> EnhancementScope;

    /// Wire behavior onto the context's subtree. An error aborts the
    /// remaining setups of the pass; cleanup still runs.
    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()>;
}

/// Closure-backed enhancement for host-provided modules
pub struct FnEnhancement<F> {
    name: &'static str,
    scope: EnhancementScope,
    setup: F,
}

impl<F> Enhancement for FnEnhancement<F>
where
    F: Fn(&mut SetupContext<'_>) -> anyhow::Result<()>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn scope(&self) -> EnhancementScope {
        self.scope
    }

    fn setup(&self, ctx: &mut SetupContext<'_>) -> anyhow::Result<()> {
        (self.setup)(ctx)
    }
}

/// Ordered list of enhancements, resolved once at startup
#[derive(Default)]
pub struct EnhancementRegistry {
    enhancements: Vec<Box<dyn Enhancement>>,
}

impl EnhancementRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in subtree enhancements in page order
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Carousels);
        registry.register(CollapsibleLists);
        registry.register(CollapsibleGrids);
        registry.register(RelativeTime::new());
        registry.register(LazyImages);
        registry
    }

    /// Register an enhancement. Setups run in registration order.
    pub fn register(&mut self, enhancement: impl Enhancement + 'static) {
        self.enhancements.push(Box::new(enhancement));
    }

    /// Register a closure as an enhancement
    pub fn register_fn<F>(&mut self, name: &'static str, scope: EnhancementScope, setup: F)
    where
        F: Fn(&mut SetupContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.register(FnEnhancement { name, scope, setup });
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Enhancement> {
        self.enhancements.iter().map(|e| e.as_ref())
    }

    /// Subtree-safe enhancements only, in registration order
    pub fn subtree(&self) -> impl Iterator<Item = &dyn Enhancement> {
        self.iter()
            .filter(|e| e.scope() == EnhancementScope::Subtree)
    }

    pub fn len(&self) -> usize {
        self.enhancements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enhancements.is_empty()
    }

    /// Get names of registered enhancements (for logging/debug)
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|e| e.name()).collect()
    }
}

/// Outcome of running a sequence of setups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupRun {
    /// Setups that completed
    pub completed: usize,
    /// Name and message of the setup that failed, if any
    pub failed: Option<(&'static str, String)>,
}

/// Run `enhancements` in order until the first failure
pub fn run_setups<'e>(
    enhancements: impl Iterator<Item = &'e dyn Enhancement>,
    ctx: &mut SetupContext<'_>,
) -> SetupRun {
    let mut run = SetupRun::default();
    for enhancement in enhancements {
        match enhancement.setup(ctx) {
            Ok(()) => run.completed += 1,
            Err(e) => {
                tracing::error!(
                    enhancement = enhancement.name(),
                    "Enhancement setup failed: {:#}",
                    e
                );
                run.failed = Some((enhancement.name(), format!("{:#}", e)));
                break;
            }
        }
    }
    run
}

#[derive(Default)]
struct DebounceState {
    pending: Option<TimerId>,
    times_debounced: u32,
}

/// Rate-limit `callback`: each call pushes it `delay` into the future, but
/// after `max_debounce_times` consecutive pushes it runs immediately.
pub fn throttled_debounce(callback: Handler, max_debounce_times: u32, delay: Duration) -> Handler {
    let state = Rc::new(RefCell::new(DebounceState::default()));

    Rc::new(move |doc: &mut Document| {
        let pending = state.borrow_mut().pending.take();
        if let Some(id) = pending {
            doc.clear_timeout(id);
        }

        if state.borrow().times_debounced == max_debounce_times {
            state.borrow_mut().times_debounced = 0;
            callback(doc);
            return;
        }

        state.borrow_mut().times_debounced += 1;
        let timer_state = Rc::clone(&state);
        let timer_callback = Rc::clone(&callback);
        let id = doc.set_timeout(delay, move |doc| {
            {
                let mut state = timer_state.borrow_mut();
                state.times_debounced = 0;
                state.pending = None;
            }
            timer_callback(doc);
        });
        state.borrow_mut().pending = Some(id);
    })
}
