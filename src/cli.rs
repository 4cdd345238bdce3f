// CLI module - command-line argument parsing and config handlers
//
// Subcommands:
// - load (default): bootstrap the configured page and print its markup
// - refresh <id>: bootstrap, refresh one widget, print the widget markup
// - demo: run against the bundled mock server
// - config --show|--reset|--path

use crate::config::{Config, VERSION};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;

/// Headless client for server-rendered dashboard pages
#[derive(Parser, Debug)]
#[command(name = "dashpage")]
#[command(version = VERSION)]
#[command(about = "Headless client for server-rendered dashboard pages", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Per-run overrides, applied on top of env > file > defaults
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Dashboard server origin, e.g. http://127.0.0.1:8080
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Path prefix the dashboard is mounted under
    #[arg(long, global = true)]
    pub base_path: Option<String>,

    /// Page slug to load
    #[arg(long, global = true)]
    pub slug: Option<String>,

    /// Skip the local HTML cache for this run
    #[arg(long, global = true)]
    pub no_cache: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.trim_end_matches('/').to_string();
        }
        if let Some(slug) = &self.slug {
            config.slug = slug.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the page and print its markup (default)
    Load,

    /// Load the page, refresh one widget and print the widget markup
    Refresh {
        /// Value of the widget's data-widget-id
        widget_id: String,
    },

    /// Run a scripted session against a bundled mock dashboard server
    Demo,

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle `config` flags
pub fn handle_config(cli: &Cli, show: bool, reset: bool, path: bool) -> Result<()> {
    if path {
        handle_config_path()
    } else if show {
        handle_config_show(&cli.overrides)
    } else if reset {
        handle_config_reset()
    } else {
        println!("Usage: dashpage config [--show|--reset|--path]");
        println!();
        println!("Options:");
        println!("  --show    Display effective configuration");
        println!("  --reset   Reset config file to defaults");
        println!("  --path    Show config file path");
        Ok(())
    }
}

fn handle_config_path() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;
    println!("{}", path.display());
    Ok(())
}

fn handle_config_show(overrides: &Overrides) -> Result<()> {
    let mut config = Config::from_env()?;
    overrides.apply(&mut config);

    println!("# Effective configuration (flags > env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
    Ok(())
}

fn handle_config_reset() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read confirmation")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let path = Config::reset_config_file()?;
    println!("Config reset to defaults: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dashpage",
            "refresh",
            "42",
            "--server",
            "http://dash.local:9000",
            "--base-path",
            "/glance/",
            "--no-cache",
        ])
        .unwrap();

        assert!(matches!(cli.command, Some(Commands::Refresh { ref widget_id }) if widget_id == "42"));

        let mut config = Config::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.server_url, "http://dash.local:9000");
        assert_eq!(config.base_path, "/glance");
        assert_eq!(config.slug, "home");
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["dashpage", "--slug", "work"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.overrides.slug.as_deref(), Some("work"));
    }

    #[test]
    fn test_config_flags() {
        let cli = Cli::try_parse_from(["dashpage", "config", "--path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config { path: true, show: false, reset: false })
        ));
    }
}
