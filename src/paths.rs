//! XDG-style path utilities for configuration.
//!
//! Prefers the XDG Base Directory conventions over OS-specific locations so
//! the config lives in the same place on Linux and macOS.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "tome";

/// Returns the configuration directory for tome.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/tome` if `XDG_CONFIG_HOME` is set
/// 2. `~/.config/tome` otherwise
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => Ok(PathBuf::from(xdg).join(APP_DIR)),
        _ => Ok(home_dir()?.join(".config").join(APP_DIR)),
    }
}

/// Returns the path of the main config file.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Failed to determine home directory")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_xdg<F: FnOnce()>(value: Option<&str>, f: F) {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        // SAFETY: env mutation is serialized with #[serial]
        unsafe {
            match value {
                Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        f();

        unsafe {
            match original {
                Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_dir_default() {
        with_xdg(None, || {
            let dir = config_dir().unwrap();
            assert!(dir.ends_with(".config/tome"));
        });
    }

    #[test]
    #[serial]
    fn test_config_dir_xdg_override() {
        with_xdg(Some("/custom/config"), || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/config/tome"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/config/tome/config.toml")
            );
        });
    }
}
