// Demo mode: run the page client against a bundled mock dashboard server
//
// The mock server speaks the same two endpoints a real dashboard does:
// - GET /api/pages/:slug/content/   page content, a new revision per request
// - GET /api/widgets/:id/           one widget fragment (Accept: text/html)
//
// The scenario walks through a cold load, a warm load that revalidates and
// picks up the new revision, a successful widget refresh and a failing one.
//
// Run with: dashpage demo

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::Config;
use crate::fetch::ReqwestTransport;
use crate::page::{LoadReport, Page};
use crate::session::Dashboard;
use crate::widget::RefreshOutcome;

/// Slug served by the mock server
pub const DEMO_SLUG: &str = "demo";

/// Widget that refreshes successfully
pub const FEED_WIDGET: &str = "feed";

/// Widget whose endpoint always answers 500
pub const BROKEN_WIDGET: &str = "broken";

// ─────────────────────────────────────────────────────────────────────────────
// Mock server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct MockState {
    revision: Arc<AtomicU64>,
    started_at: i64,
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/pages/:slug/content/", get(page_content))
        .route("/api/widgets/:widget_id/", get(widget_content))
        .with_state(state)
}

async fn page_content(State(state): State<MockState>, Path(slug): Path<String>) -> Response {
    if slug != DEMO_SLUG {
        return (StatusCode::NOT_FOUND, "Page not found").into_response();
    }
    let revision = state.revision.fetch_add(1, Ordering::SeqCst) + 1;
    Html(render_page(revision, state.started_at)).into_response()
}

async fn widget_content(
    State(state): State<MockState>,
    Path(widget_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));
    if !accepts_html {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }

    match widget_id.as_str() {
        FEED_WIDGET => {
            let revision = state.revision.load(Ordering::SeqCst);
            Html(render_feed_widget(revision, 6)).into_response()
        }
        BROKEN_WIDGET => (StatusCode::INTERNAL_SERVER_ERROR, "Upstream unavailable").into_response(),
        _ => (StatusCode::NOT_FOUND, "Widget not found").into_response(),
    }
}

fn render_feed_widget(revision: u64, items: usize) -> String {
    let items: String = (1..=items)
        .map(|i| format!(r#"<li><a class="title" href="/post/{i}">Post {i} from revision {revision}</a></li>"#))
        .collect();
    format!(
        r#"<div class="widget widget-type-feed"><div class="widget-header"><h2 class="widget-refresh-title" data-widget-id="{FEED_WIDGET}">Feed</h2></div><div class="widget-content single-line-titles"><ul class="list collapsible-container" data-collapse-after="3">{items}</ul></div></div>"#
    )
}

fn render_page(revision: u64, started_at: i64) -> String {
    format!(
        r#"{feed}
<div class="widget widget-type-videos"><div class="widget-header"><h2 class="widget-refresh-title" data-widget-id="videos">Videos</h2></div><div class="widget-content carousel-container"><div class="carousel-items-container"><img loading="lazy" src="/thumbs/1.jpg" alt=""><img loading="lazy" alt=""></div></div></div>
<div class="widget widget-type-status"><div class="widget-header"><h2 class="widget-refresh-title" data-widget-id="{BROKEN_WIDGET}">Status</h2></div><div class="widget-content"><p class="text-truncate">All systems operational across every monitored region</p></div></div>
<p class="page-footer">Revision {revision}, server up since <span data-dynamic-relative-time="{started_at}"></span></p>"#,
        feed = render_feed_widget(revision, 5),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario
// ─────────────────────────────────────────────────────────────────────────────

/// What each demo step did
#[derive(Debug)]
pub struct DemoReport {
    pub server: SocketAddr,
    pub cold: LoadReport,
    pub warm: LoadReport,
    pub refreshed: RefreshOutcome,
    pub failed: RefreshOutcome,
    /// Final page markup
    pub html: String,
}

/// Start the mock server, run the scenario, shut everything down
pub async fn run_demo(base: &Config) -> Result<DemoReport> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind mock server")?;
    let server = listener.local_addr().context("Mock server has no address")?;

    let state = MockState {
        revision: Arc::new(AtomicU64::new(0)),
        started_at: chrono::Utc::now().timestamp() - 3 * 3600,
    };
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .await
    });
    tracing::info!("Mock dashboard listening on {}", server);

    let cache_dir = demo_cache_dir();
    let _ = std::fs::remove_dir_all(&cache_dir);

    let mut config = base.clone();
    config.server_url = format!("http://{}", server);
    config.base_path = String::new();
    config.slug = DEMO_SLUG.to_string();
    config.cache.enabled = true;
    config.cache.dir = cache_dir.clone();

    let result = run_scenario(&config, server).await;

    let _ = shutdown_tx.send(());
    match handle.await {
        Ok(Err(e)) => tracing::warn!("Mock server error: {}", e),
        Err(e) => tracing::warn!("Mock server task failed: {}", e),
        Ok(Ok(())) => {}
    }
    let _ = std::fs::remove_dir_all(&cache_dir);

    result
}

fn demo_cache_dir() -> PathBuf {
    std::env::temp_dir().join(format!("dashpage-demo-{}", std::process::id()))
}

async fn run_scenario(config: &Config, server: SocketAddr) -> Result<DemoReport> {
    let dashboard = Dashboard::from_config(config);
    let transport = ReqwestTransport::new(&config.server_url)?;

    tracing::info!("Cold load (empty cache)");
    let mut page = Page::new();
    let cold = dashboard.load(&transport, &mut page).await?;

    tracing::info!("Warm load (cached render, then revalidation)");
    let mut page = Page::new();
    let warm = dashboard.load(&transport, &mut page).await?;

    tracing::info!("Refreshing widget {:?}", FEED_WIDGET);
    let (refreshed, _) = dashboard
        .refresh_widget(&transport, &mut page, FEED_WIDGET)
        .await;

    tracing::info!("Refreshing widget {:?} (expected to fail)", BROKEN_WIDGET);
    let (failed, _) = dashboard
        .refresh_widget(&transport, &mut page, BROKEN_WIDGET)
        .await;

    Ok(DemoReport {
        server,
        cold,
        warm,
        refreshed,
        failed,
        html: page.content_html(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetRefreshError;

    #[tokio::test]
    async fn test_demo_scenario_over_loopback() {
        let report = run_demo(&Config::default()).await.unwrap();

        assert!(!report.cold.cache_hit);
        assert!(report.cold.fetch_ok);
        assert!(report.cold.cache_updated);

        // Every content request bumps the revision, so revalidation reapplies
        assert!(report.warm.cache_hit);
        assert_eq!(report.warm.applies, 2);
        assert!(report.warm.cache_updated);

        let RefreshOutcome::Replaced { widget_id, setups, .. } = &report.refreshed else {
            panic!("expected replacement, got {:?}", report.refreshed);
        };
        assert_eq!(widget_id, FEED_WIDGET);
        assert_eq!(setups.failed, None);

        assert_eq!(
            report.failed,
            RefreshOutcome::Failed {
                widget_id: BROKEN_WIDGET.to_string(),
                error: WidgetRefreshError::Status(500)
            }
        );

        assert!(report.html.contains("Post 6 from revision 2"));
        assert!(report.html.contains("Show more"));
        assert!(report.html.contains(r#"title="All systems operational across every monitored region""#));
    }

    #[test]
    fn test_feed_widget_collapses_after_three() {
        let html = render_feed_widget(1, 5);
        assert_eq!(html.matches("<li>").count(), 5);
        assert!(html.contains(r#"data-collapse-after="3""#));
        assert!(html.contains(r#"data-widget-id="feed""#));
    }
}
