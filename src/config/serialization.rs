//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use std::path::Path;

use super::Config;

/// Quote a value as a TOML basic string
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quoted_path(path: &Path) -> String {
    quoted(&path.display().to_string())
}

impl Config {
    /// Serialize config to TOML string
    pub fn to_toml(&self) -> String {
        format!(
            r#"# dashpage configuration

# Dashboard server origin
server_url = {server_url}

# Path prefix the dashboard is mounted under ("" for the root)
base_path = {base_path}

# Page to load
slug = {slug}

# ─────────────────────────────────────────────────────────────────────────────
# CACHE
# ─────────────────────────────────────────────────────────────────────────────
# Cached page HTML is shown immediately and revalidated in the background.

[cache]
enabled = {cache_enabled}
dir = {cache_dir}
ttl_secs = {ttl_secs}

# ─────────────────────────────────────────────────────────────────────────────
# FETCH
# ─────────────────────────────────────────────────────────────────────────────
# The timeout covers the whole response. Only network failures are retried.

[fetch]
timeout_ms = {timeout_ms}
retry_delay_ms = {retry_delay_ms}
max_retries = {max_retries}

# ─────────────────────────────────────────────────────────────────────────────
# LOGGING
# ─────────────────────────────────────────────────────────────────────────────
# RUST_LOG overrides level. File logs are JSON.

[logging]
level = {level}
file_enabled = {file_enabled}
file_dir = {file_dir}
file_rotation = {file_rotation}
file_prefix = {file_prefix}
"#,
            server_url = quoted(&self.server_url),
            base_path = quoted(&self.base_path),
            slug = quoted(&self.slug),
            cache_enabled = self.cache.enabled,
            cache_dir = quoted_path(&self.cache.dir),
            ttl_secs = self.cache.ttl_secs,
            timeout_ms = self.fetch.timeout_ms,
            retry_delay_ms = self.fetch.retry_delay_ms,
            max_retries = self.fetch.max_retries,
            level = quoted(&self.logging.level),
            file_enabled = self.logging.file_enabled,
            file_dir = quoted_path(&self.logging.file_dir),
            file_rotation = quoted(self.logging.file_rotation.as_str()),
            file_prefix = quoted(&self.logging.file_prefix),
        )
    }
}
