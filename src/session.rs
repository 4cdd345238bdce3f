// Session wiring - builds page and widget controllers from configuration
//
// One Dashboard per process. Controllers borrow a transport so the page load
// and any widget refreshes share one HTTP client.

use anyhow::Result;
use std::rc::Rc;

use crate::cache::{ContentCache, FileStorage, MemoryStorage};
use crate::config::Config;
use crate::dom::NodeId;
use crate::enhance::EnhancementRegistry;
use crate::fetch::{ContentFetcher, PageDescriptor, Transport};
use crate::page::{LoadReport, Page, PageLifecycleController};
use crate::widget::{RefreshOutcome, WidgetRefreshController};

/// Everything needed to load one dashboard page
pub struct Dashboard {
    config: Config,
    descriptor: PageDescriptor,
    registry: Rc<EnhancementRegistry>,
}

impl Dashboard {
    pub fn from_config(config: &Config) -> Self {
        Self {
            descriptor: PageDescriptor::new(config.slug.clone(), config.base_path.clone()),
            registry: Rc::new(EnhancementRegistry::standard()),
            config: config.clone(),
        }
    }

    pub fn registry(&self) -> &EnhancementRegistry {
        &self.registry
    }

    pub fn descriptor(&self) -> &PageDescriptor {
        &self.descriptor
    }

    /// The configured cache. A disabled cache misses on every read and
    /// swallows every write.
    pub fn cache(&self) -> ContentCache {
        let cache = if self.config.cache.enabled {
            ContentCache::new(FileStorage::new(&self.config.cache.dir))
        } else {
            ContentCache::new(MemoryStorage::disabled())
        };
        cache.with_ttl(self.config.cache.ttl())
    }

    pub fn lifecycle<T: Transport>(&self, transport: T) -> PageLifecycleController<T> {
        let fetcher = ContentFetcher::new(transport)
            .with_timeout(self.config.fetch.timeout())
            .with_retry(self.config.fetch.retry_delay(), self.config.fetch.max_retries);

        PageLifecycleController::new(
            self.descriptor.clone(),
            self.cache(),
            fetcher,
            Rc::clone(&self.registry),
        )
    }

    pub fn widgets<T: Transport>(&self, transport: T) -> WidgetRefreshController<T> {
        WidgetRefreshController::new(transport, self.descriptor.clone(), Rc::clone(&self.registry))
    }

    /// Bootstrap `page` and run its timers to completion
    pub async fn load<T: Transport>(&self, transport: T, page: &mut Page) -> Result<LoadReport> {
        let report = self.lifecycle(transport).start(page).await?;
        let timers = page.document_mut().settle().await;

        tracing::info!(
            slug = %self.descriptor.slug,
            cache_hit = report.cache_hit,
            fetch_ok = report.fetch_ok,
            applies = report.applies,
            timers,
            "Page loaded"
        );
        Ok(report)
    }

    /// Refresh one widget on an already loaded page, then settle timers.
    /// Returns the outcome and the replacement node, if any.
    pub async fn refresh_widget<T: Transport>(
        &self,
        transport: T,
        page: &mut Page,
        widget_id: &str,
    ) -> (RefreshOutcome, Option<NodeId>) {
        let outcome = self.widgets(transport).refresh(page, widget_id).await;
        page.document_mut().settle().await;

        let element = match &outcome {
            RefreshOutcome::Replaced { element, .. } => Some(*element),
            _ => None,
        };
        (outcome, element)
    }
}
