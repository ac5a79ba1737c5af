//! Subcommand implementations.

/// Glossary extraction command handler.
pub mod extract;

/// Model listing and token counting handlers.
pub mod models;

/// Provider listing command handler.
pub mod providers;

/// Translation command handler.
pub mod translate;

use anyhow::Result;

use crate::config::{ConfigManager, EnvCredentials, ResolveOptions, ResolvedConfig, resolve_config};

/// Loads the config file and resolves it against CLI overrides and the
/// process environment.
pub(crate) fn load_resolved(options: &ResolveOptions) -> Result<ResolvedConfig> {
    let manager = ConfigManager::new()?;
    let config_file = manager.load_or_default()?;
    resolve_config(options, &config_file, &EnvCredentials)
}
