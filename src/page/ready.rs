//! Content-ready callbacks
//!
//! Enhancements register work that needs a stable DOM (measuring, observing)
//! here during setup. The owner flushes the list once the pass's setups are
//! done. A pass clears the list before running setups, so callbacks from an
//! earlier pass can never leak into a later one.

use crate::dom::Document;

type ReadyCallback = Box<dyn FnOnce(&mut Document)>;

/// Ordered list of callbacks for the current apply pass
#[derive(Default)]
pub struct ReadyCallbacks {
    callbacks: Vec<ReadyCallback>,
}

impl ReadyCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Document) + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Forget every pending callback without running it
    pub fn clear(&mut self) -> usize {
        let dropped = self.callbacks.len();
        self.callbacks.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run and drain every callback in registration order. Returns how many ran.
    pub fn flush(&mut self, doc: &mut Document) -> usize {
        let callbacks = std::mem::take(&mut self.callbacks);
        let count = callbacks.len();
        for callback in callbacks {
            callback(doc);
        }
        count
    }
}

impl std::fmt::Debug for ReadyCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyCallbacks")
            .field("pending", &self.callbacks.len())
            .finish()
    }
}
