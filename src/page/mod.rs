//! Page bootstrap: apply passes and the load lifecycle
//!
//! # Load lifecycle
//!
//! ```text
//! Idle → CacheCheck ─ hit ──→ OptimisticApplied → Fetching → Applied
//!                   └ miss ─────────────────────→ Fetching → Applied
//! ```
//!
//! On a cache hit the cached html is applied immediately and revalidated in
//! the background. A successful fetch that differs from the cache replaces it
//! and is applied a second time; a failed one leaves the optimistic render
//! alone. On a miss whatever the fetch returns is applied, and only successes
//! are cached.
//!
//! # Apply pass
//!
//! 1. Replace the content container's children with the parsed html
//! 2. Clear ready callbacks, release listeners owned by the previous pass
//!    and by refreshed widgets
//! 3. Run every registered setup in order; the first failure stops the rest
//! 4. Cleanup, always: mark the page ready, flush ready callbacks, schedule
//!    the truncated-title reveal and the column transition class

pub mod ready;

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::cache::ContentCache;
use crate::dom::{Document, ListenerSet, NodeId};
use crate::enhance::{run_setups, titles, EnhancementRegistry, SetupContext, SetupRun};
use crate::fetch::{ContentFetcher, PageDescriptor, Transport};

pub use ready::ReadyCallbacks;

/// Id of the page container element
pub const PAGE_ELEMENT_ID: &str = "page";

/// Id of the content container element
pub const CONTENT_ELEMENT_ID: &str = "page-content";

const TRUNCATED_TITLES_DELAY: Duration = Duration::from_millis(50);
const COLUMNS_TRANSITION_DELAY: Duration = Duration::from_millis(300);

/// What one apply pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// 1-based pass number
    pub pass: u64,
    pub setups: SetupRun,
    /// Ready callbacks flushed during cleanup
    pub ready_callbacks: usize,
    /// Listeners from earlier passes and widget refreshes that were released
    pub listeners_released: usize,
}

/// The page shell plus everything owned by the current apply pass
///
/// The document arena never frees nodes, so it grows by the size of every
/// fragment applied or swapped in. A `Page` is meant to live for one load
/// plus a handful of widget refreshes; long-running hosts should build a new
/// one per load.
pub struct Page {
    document: Document,
    page_el: NodeId,
    content_el: NodeId,
    ready: ReadyCallbacks,
    pass_listeners: ListenerSet,
    widget_listeners: HashMap<String, ListenerSet>,
    passes: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    /// Blank shell: `<div id="page" aria-busy="true"><div id="page-content">`
    pub fn new() -> Self {
        let mut document = Document::new();
        let page_el = document.create_element("div");
        document.set_attr(page_el, "id", PAGE_ELEMENT_ID);
        document.add_class(page_el, "page");
        document.set_attr(page_el, "aria-busy", "true");
        let content_el = document.create_element("div");
        document.set_attr(content_el, "id", CONTENT_ELEMENT_ID);
        document.append_child(page_el, content_el);
        let body = document.body();
        document.append_child(body, page_el);

        Self::with_elements(document, page_el, content_el)
    }

    /// Wrap an existing document. Both shell elements must be present.
    pub fn from_document(document: Document) -> Result<Self> {
        let page_el = document
            .element_by_id(PAGE_ELEMENT_ID)
            .ok_or_else(|| anyhow!("Page shell is missing #{}", PAGE_ELEMENT_ID))?;
        let content_el = document
            .element_by_id(CONTENT_ELEMENT_ID)
            .ok_or_else(|| anyhow!("Page shell is missing #{}", CONTENT_ELEMENT_ID))?;
        Ok(Self::with_elements(document, page_el, content_el))
    }

    /// Parse a server-rendered shell (body markup) into a page
    pub fn from_shell_html(html: &str) -> Result<Self> {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(body, html)
            .context("Failed to parse page shell")?;
        Self::from_document(document)
    }

    fn with_elements(document: Document, page_el: NodeId, content_el: NodeId) -> Self {
        Self {
            document,
            page_el,
            content_el,
            ready: ReadyCallbacks::new(),
            pass_listeners: ListenerSet::new(),
            widget_listeners: HashMap::new(),
            passes: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn page_element(&self) -> NodeId {
        self.page_el
    }

    pub fn content_element(&self) -> NodeId {
        self.content_el
    }

    /// Apply passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// True once any apply pass has completed cleanup
    pub fn is_content_ready(&self) -> bool {
        self.document.has_class(self.page_el, "content-ready")
    }

    pub fn content_html(&self) -> String {
        self.document.inner_html(self.content_el)
    }

    /// Replace the content and run every registered setup
    pub fn apply(&mut self, html: &str, registry: &EnhancementRegistry) -> Result<ApplyReport> {
        self.document
            .set_inner_html(self.content_el, html)
            .context("Failed to apply page content")?;

        self.ready.clear();
        let mut listeners_released = self.pass_listeners.release(&mut self.document);
        for (_, mut set) in self.widget_listeners.drain() {
            listeners_released += set.release(&mut self.document);
        }

        self.passes += 1;
        let pass = self.passes;
        let root = self.document.root();

        let setups = {
            let mut ctx = SetupContext::new(
                &mut self.document,
                root,
                &mut self.ready,
                &mut self.pass_listeners,
            );
            run_setups(registry.iter(), &mut ctx)
        };

        let ready_callbacks = self.cleanup();

        tracing::debug!(
            pass,
            setups = setups.completed,
            ready_callbacks,
            listeners_released,
            nodes = self.document.node_count(),
            "Content applied"
        );

        Ok(ApplyReport {
            pass,
            setups,
            ready_callbacks,
            listeners_released,
        })
    }

    fn cleanup(&mut self) -> usize {
        let doc = &mut self.document;
        doc.add_class(self.page_el, "content-ready");
        doc.set_attr(self.page_el, "aria-busy", "false");

        let flushed = self.ready.flush(doc);

        doc.set_timeout(TRUNCATED_TITLES_DELAY, |doc| {
            let root = doc.root();
            titles::reveal_truncated_titles(doc, root);
        });
        doc.set_timeout(COLUMNS_TRANSITION_DELAY, |doc| {
            let body = doc.body();
            doc.add_class(body, "page-columns-transitioned");
        });

        flushed
    }

    /// Take ownership of the listeners set up for a refreshed widget,
    /// releasing the ones from its previous refresh. Returns how many were released.
    pub(crate) fn adopt_widget_listeners(&mut self, widget_id: &str, listeners: ListenerSet) -> usize {
        match self.widget_listeners.insert(widget_id.to_string(), listeners) {
            Some(mut previous) => previous.release(&mut self.document),
            None => 0,
        }
    }
}

/// Where a page load currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Idle,
    CacheCheck,
    OptimisticApplied,
    Fetching,
    Applied,
}

/// What one page load did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// A fresh cache entry was rendered before fetching
    pub cache_hit: bool,
    /// The network fetch succeeded
    pub fetch_ok: bool,
    /// Apply passes run by this load (1 or 2)
    pub applies: usize,
    /// The cache entry was written
    pub cache_updated: bool,
}

/// Drives one page from cache check to applied content
pub struct PageLifecycleController<T> {
    descriptor: PageDescriptor,
    cache: ContentCache,
    fetcher: ContentFetcher<T>,
    registry: Rc<EnhancementRegistry>,
    state: PageState,
}

impl<T: Transport> PageLifecycleController<T> {
    pub fn new(
        descriptor: PageDescriptor,
        cache: ContentCache,
        fetcher: ContentFetcher<T>,
        registry: Rc<EnhancementRegistry>,
    ) -> Self {
        Self {
            descriptor,
            cache,
            fetcher,
            registry,
            state: PageState::Idle,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn descriptor(&self) -> &PageDescriptor {
        &self.descriptor
    }

    fn transition(&mut self, next: PageState) {
        tracing::trace!(slug = %self.descriptor.slug, "Page state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Load the page: cached render first when possible, then the network
    pub async fn start(&mut self, page: &mut Page) -> Result<LoadReport> {
        let slug = self.descriptor.slug.clone();
        let mut report = LoadReport::default();

        self.transition(PageState::CacheCheck);

        if let Some(cached) = self.cache.get(&slug) {
            report.cache_hit = true;
            page.apply(&cached, &self.registry)?;
            report.applies += 1;
            self.transition(PageState::OptimisticApplied);

            self.transition(PageState::Fetching);
            let result = self.fetcher.fetch(&self.descriptor).await;
            report.fetch_ok = result.ok;

            if !result.ok {
                tracing::debug!(slug = %slug, "Revalidation failed, keeping cached content");
            } else if result.html == cached {
                tracing::debug!(slug = %slug, "Cached content is current");
            } else {
                self.cache.set(&slug, &result.html);
                report.cache_updated = true;
                page.apply(&result.html, &self.registry)?;
                report.applies += 1;
            }

            self.transition(PageState::Applied);
            return Ok(report);
        }

        self.transition(PageState::Fetching);
        let result = self.fetcher.fetch(&self.descriptor).await;
        report.fetch_ok = result.ok;
        if result.ok {
            self.cache.set(&slug, &result.html);
            report.cache_updated = true;
        }
        page.apply(&result.html, &self.registry)?;
        report.applies += 1;

        self.transition(PageState::Applied);
        Ok(report)
    }
}
