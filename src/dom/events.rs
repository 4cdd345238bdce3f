//! Event listeners with explicit handles
//!
//! Every attach returns a [`ListenerHandle`]; detaching takes the same handle.
//! Whoever attaches a listener owns its handle and is responsible for
//! releasing it, usually by collecting handles into a [`ListenerSet`].
//!
//! Listeners on nodes that leave the tree are dropped automatically when the
//! tree is mutated through `set_inner_html` or `replace_with`. Window and
//! document listeners live until their handle is released.

use std::rc::Rc;

use super::{Document, NodeId};

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Document,
    Node(NodeId),
}

pub(crate) type Handler = Rc<dyn Fn(&mut Document)>;

/// Proof of one attached listener; pass it back to detach
#[derive(Debug, PartialEq, Eq)]
pub struct ListenerHandle {
    id: u64,
    target: EventTarget,
    event: String,
}

impl ListenerHandle {
    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

struct Listener {
    id: u64,
    target: EventTarget,
    event: String,
    handler: Handler,
}

#[derive(Default)]
pub(super) struct EventListeners {
    next_id: u64,
    entries: Vec<Listener>,
}

impl EventListeners {
    fn attach(&mut self, target: EventTarget, event: &str, handler: Handler) -> ListenerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Listener {
            id,
            target,
            event: event.to_string(),
            handler,
        });
        ListenerHandle {
            id,
            target,
            event: event.to_string(),
        }
    }

    fn detach(&mut self, handle: &ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|l| l.id != handle.id);
        self.entries.len() != before
    }

    fn count(&self, target: EventTarget, event: &str) -> usize {
        self.entries
            .iter()
            .filter(|l| l.target == target && l.event == event)
            .count()
    }

    fn handlers(&self, target: EventTarget, event: &str) -> Vec<Handler> {
        self.entries
            .iter()
            .filter(|l| l.target == target && l.event == event)
            .map(|l| Rc::clone(&l.handler))
            .collect()
    }
}

impl Document {
    /// Attach `handler` for `event` on `target`
    pub fn add_listener<F>(&mut self, target: EventTarget, event: &str, handler: F) -> ListenerHandle
    where
        F: Fn(&mut Document) + 'static,
    {
        self.listeners.attach(target, event, Rc::new(handler))
    }

    pub(crate) fn add_shared_listener(
        &mut self,
        target: EventTarget,
        event: &str,
        handler: Handler,
    ) -> ListenerHandle {
        self.listeners.attach(target, event, handler)
    }

    /// Detach the listener behind `handle`. Returns false if it was already gone.
    pub fn remove_listener(&mut self, handle: &ListenerHandle) -> bool {
        self.listeners.detach(handle)
    }

    pub fn listener_count(&self, target: EventTarget, event: &str) -> usize {
        self.listeners.count(target, event)
    }

    /// Run every listener for `event` on `target` in attach order.
    /// Returns how many ran.
    pub fn dispatch(&mut self, target: EventTarget, event: &str) -> usize {
        let handlers = self.listeners.handlers(target, event);
        for handler in &handlers {
            handler(self);
        }
        handlers.len()
    }

    /// Forget listeners whose node target is no longer in the tree
    pub(super) fn drop_detached_listeners(&mut self) {
        let detached: Vec<NodeId> = self
            .listeners
            .entries
            .iter()
            .filter_map(|l| match l.target {
                EventTarget::Node(node) if !self.is_connected(node) => Some(node),
                _ => None,
            })
            .collect();
        if detached.is_empty() {
            return;
        }
        self.listeners.entries.retain(|l| match l.target {
            EventTarget::Node(node) => !detached.contains(&node),
            _ => true,
        });
        tracing::trace!("Dropped listeners for {} detached node(s)", detached.len());
    }
}

/// Handles owned by one apply pass or one refreshed widget
#[derive(Debug, Default)]
pub struct ListenerSet {
    handles: Vec<ListenerHandle>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ListenerHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Detach every listener in the set. Returns how many were still attached.
    pub fn release(&mut self, doc: &mut Document) -> usize {
        self.handles
            .drain(..)
            .filter(|handle| doc.remove_listener(handle))
            .count()
    }
}
