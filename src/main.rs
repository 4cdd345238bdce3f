// dashpage - headless client for server-rendered dashboard pages
//
// Loads one dashboard page the way the browser-side loader does: show cached
// HTML immediately when fresh enough, revalidate against the server, run the
// enhancement modules over the applied markup, and refresh single widgets in
// place on request.
//
// Architecture:
// - dom: arena document with html5ever parsing, listeners and a timer queue
// - cache / fetch: TTL-bounded HTML cache and the timeout + retry fetcher
// - enhance: registry of enhancement modules (carousels, collapsibles, ...)
// - page / widget: page lifecycle controller and in-place widget refresh
// - session: wires config into controllers for the CLI and demo

mod cache;
mod cli;
mod config;
mod demo;
mod dom;
mod enhance;
mod fetch;
mod logging;
mod page;
mod session;
mod startup;
mod util;
mod widget;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use fetch::ReqwestTransport;
use logging::LogBuffer;
use page::Page;
use session::Dashboard;
use widget::RefreshOutcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config commands exit before logging is set up
    if let Some(Commands::Config { show, reset, path }) = &cli.command {
        return cli::handle_config(&cli, *show, *reset, *path);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env()?;
    cli.overrides.apply(&mut config);

    // Precedence: RUST_LOG env var > config file > default "info"
    let console = LogBuffer::new();
    let _file_guard = logging::init(&config.logging, console.clone());

    let result = match cli.command {
        Some(Commands::Demo) => run_demo(&config).await,
        Some(Commands::Refresh { widget_id }) => run_refresh(&config, &widget_id).await,
        Some(Commands::Load) | None => run_load(&config).await,
        Some(Commands::Config { .. }) => Ok(()),
    };

    print_console(&console);
    result
}

async fn run_load(config: &Config) -> Result<()> {
    let dashboard = Dashboard::from_config(config);
    startup::print_startup(config, dashboard.registry());

    let transport = ReqwestTransport::new(&config.server_url)?;
    let mut page = Page::new();
    let report = dashboard.load(&transport, &mut page).await?;

    if !report.fetch_ok {
        tracing::warn!(slug = %config.slug, "Page content could not be fetched");
    }

    let doc = page.document();
    println!("{}", doc.outer_html(page.page_element()));
    Ok(())
}

async fn run_refresh(config: &Config, widget_id: &str) -> Result<()> {
    let dashboard = Dashboard::from_config(config);
    startup::print_startup(config, dashboard.registry());

    let transport = ReqwestTransport::new(&config.server_url)?;
    let mut page = Page::new();
    dashboard.load(&transport, &mut page).await?;

    let (outcome, element) = dashboard
        .refresh_widget(&transport, &mut page, widget_id)
        .await;

    match (outcome, element) {
        (RefreshOutcome::Replaced { .. }, Some(element)) => {
            println!("{}", page.document().outer_html(element));
            Ok(())
        }
        (RefreshOutcome::Ignored, _) => {
            anyhow::bail!("No widget with data-widget-id {:?} on page {:?}", widget_id, config.slug)
        }
        (RefreshOutcome::Failed { error, .. }, _) => {
            Err(error).with_context(|| format!("Widget {:?} was not refreshed", widget_id))
        }
        (outcome, _) => anyhow::bail!("Widget {:?} was not refreshed: {:?}", widget_id, outcome),
    }
}

async fn run_demo(config: &Config) -> Result<()> {
    let report = demo::run_demo(config).await?;

    println!("Mock dashboard: http://{}", report.server);
    println!();
    println!(
        "cold load   cache_hit={} fetch_ok={} applies={} cached={}",
        report.cold.cache_hit, report.cold.fetch_ok, report.cold.applies, report.cold.cache_updated
    );
    println!(
        "warm load   cache_hit={} fetch_ok={} applies={} cached={}",
        report.warm.cache_hit, report.warm.fetch_ok, report.warm.applies, report.warm.cache_updated
    );
    println!("refresh     {}", describe_outcome(&report.refreshed));
    println!("refresh     {}", describe_outcome(&report.failed));
    println!();
    println!("{}", report.html);
    Ok(())
}

fn describe_outcome(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Ignored => "ignored (not a refresh trigger)".to_string(),
        RefreshOutcome::Replaced {
            widget_id, setups, ..
        } => format!("{} replaced, {} setups ran", widget_id, setups.completed),
        RefreshOutcome::Failed { widget_id, error } => format!("{} failed: {}", widget_id, error),
        RefreshOutcome::Dropped { widget_id } => format!("{} dropped (left the page)", widget_id),
    }
}

/// Print captured warnings and errors after the run
fn print_console(console: &LogBuffer) {
    let entries = console.get_all();
    if entries.is_empty() {
        return;
    }

    eprintln!();
    eprintln!("Console ({} message{}):", entries.len(), if entries.len() == 1 { "" } else { "s" });
    for entry in entries {
        eprintln!(
            "  {} {:<5} {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.level.as_str(),
            entry.target,
            entry.message
        );
    }
}
