//! Global output configuration: quiet mode, log verbosity, and the
//! stderr/stdout split.
//!
//! Translations go to stdout so they can be piped. Status lines, progress and
//! log records go to stderr.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static OUTPUT_CONFIG: OnceLock<OutputConfig> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Suppress status lines and lower logging to errors only.
    pub quiet: bool,
    /// Log request lifecycle details.
    pub verbose: bool,
}

impl OutputConfig {
    /// Default log directive when `RUST_LOG` is not set.
    pub const fn default_directive(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "tome_cli=debug,warn"
        } else {
            "warn"
        }
    }
}

/// Initializes the global output configuration and installs the log
/// subscriber. Later calls are ignored.
pub fn init(config: OutputConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    let _ = OUTPUT_CONFIG.set(config);
}

pub fn config() -> &'static OutputConfig {
    OUTPUT_CONFIG.get_or_init(OutputConfig::default)
}

pub fn is_quiet() -> bool {
    config().quiet
}

/// Print a status message to stderr (respects quiet mode).
#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        if !$crate::output::is_quiet() {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_config_default() {
        let config = OutputConfig::default();
        assert!(!config.quiet);
        assert_eq!(config.default_directive(), "warn");
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        let config = OutputConfig {
            quiet: true,
            verbose: true,
        };
        assert_eq!(config.default_directive(), "error");

        let config = OutputConfig {
            quiet: false,
            verbose: true,
        };
        assert!(config.default_directive().contains("debug"));
    }
}
