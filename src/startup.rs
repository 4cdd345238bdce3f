// Startup module - banner and module status
//
// Printed to stderr: stdout is reserved for page markup so output can be
// piped straight into a file.

use crate::config::{Config, VERSION};
use crate::enhance::EnhancementRegistry;

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module loading result for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: String,
}

/// Print the startup banner and module status
pub fn print_startup(config: &Config, registry: &EnhancementRegistry) {
    use colors::*;

    eprintln!();
    eprintln!("  {BOLD}{CYAN}dashpage{RESET} {DIM}v{VERSION}{RESET}");
    eprintln!("  {DIM}Headless dashboard page client{RESET}");
    eprintln!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            eprintln!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            eprintln!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    eprintln!();

    for module in get_module_status(config, registry) {
        print_module_status(&module);
    }
    eprintln!();

    eprintln!(
        "  {MAGENTA}▸{RESET} Page {BOLD}{}{RESET} on {}{}",
        config.slug, config.server_url, config.base_path
    );
    eprintln!();
}

/// Status of the cache, the fetcher and every registered enhancement
fn get_module_status(config: &Config, registry: &EnhancementRegistry) -> Vec<ModuleStatus> {
    let mut modules = vec![
        ModuleStatus {
            name: "cache",
            enabled: config.cache.enabled,
            description: format!("{}s TTL", config.cache.ttl_secs),
        },
        ModuleStatus {
            name: "fetch",
            enabled: true, // Core, always on
            description: format!(
                "{}ms timeout, {} retr{}",
                config.fetch.timeout_ms,
                config.fetch.max_retries,
                if config.fetch.max_retries == 1 { "y" } else { "ies" }
            ),
        },
    ];

    modules.extend(registry.iter().map(|enhancement| ModuleStatus {
        name: enhancement.name(),
        enabled: true,
        description: format!("{} enhancement", enhancement.scope().as_str()),
    }));

    modules
}

/// Print a single module's status
fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    eprintln!(
        "    {icon} {style}{:<18}{RESET} {DIM}{}{RESET}",
        module.name, module.description
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_status_lists_enhancements_in_order() {
        let mut config = Config::default();
        config.cache.enabled = false;
        let registry = EnhancementRegistry::standard();

        let modules = get_module_status(&config, &registry);
        let names: Vec<_> = modules.iter().map(|m| m.name).collect();

        assert_eq!(&names[..2], &["cache", "fetch"]);
        assert_eq!(names[2..].to_vec(), registry.names());
        assert!(!modules[0].enabled);
        assert_eq!(modules[1].description, "30000ms timeout, 1 retry");
    }
}
