use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::credentials::CredentialStore;
use crate::paths;
use crate::project::DEFAULT_COST_PER_1K_TOKENS;
use crate::provider::{ProviderKind, ProviderSettings, validate_settings};
use crate::translation::resolve_language;

pub const DEFAULT_SOURCE_LANGUAGE: &str = "English";

/// Default settings in the `[tome]` section of config.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomeConfig {
    /// Default provider name.
    pub provider: Option<String>,
    /// Default model name.
    pub model: Option<String>,
    /// Default source language (code or name).
    pub from: Option<String>,
    /// Default target language (code or name).
    pub to: Option<String>,
    /// Price used for the running cost estimate.
    pub cost_per_1k_tokens: Option<f64>,
}

/// One `[providers.<name>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API family; configs without it are treated as OpenAI-compatible.
    #[serde(default = "default_kind")]
    pub kind: ProviderKind,
    /// Base URL. Falls back to the kind's public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key stored directly in config (not recommended).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

const fn default_kind() -> ProviderKind {
    ProviderKind::OpenAi
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            endpoint: None,
            api_key: None,
            api_key_env: None,
            models: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
    }

    /// Gets the API key, preferring the credential store over the config file.
    pub fn api_key(&self, credentials: &dyn CredentialStore) -> Option<String> {
        if let Some(env_var) = &self.api_key_env
            && let Some(key) = credentials.secret(env_var)
        {
            return Some(key);
        }
        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }

    /// Returns `true` if this provider cannot be used without a key.
    pub const fn requires_api_key(&self) -> bool {
        self.kind.requires_api_key() || self.api_key.is_some() || self.api_key_env.is_some()
    }
}

/// The complete configuration file structure.
///
/// Corresponds to `~/.config/tome/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tome: TomeConfig,
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Configuration after merging CLI arguments, the config file and credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub provider: ProviderSettings,
    pub model: String,
    /// Language names as they appear in prompts.
    pub source_language: String,
    pub target_language: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub cost_per_1k_tokens: f64,
}

/// CLI overrides that take precedence over config file values.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub from: Option<String>,
    pub to: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Resolves configuration by merging CLI options with config file settings.
///
/// # Errors
///
/// Returns an error if the provider, model or target language is missing,
/// the provider is unknown, a language is not recognized, the endpoint is not
/// a valid URL, or a required API key cannot be found.
pub fn resolve_config(
    options: &ResolveOptions,
    config_file: &ConfigFile,
    credentials: &dyn CredentialStore,
) -> Result<ResolvedConfig> {
    let provider_name = options
        .provider
        .as_ref()
        .or(config_file.tome.provider.as_ref())
        .cloned()
        .ok_or_else(|| missing("provider", "--provider <name>"))?;

    let provider_config = config_file
        .providers
        .get(&provider_name)
        .ok_or_else(|| provider_not_found(&provider_name, config_file))?;

    let model = options
        .model
        .as_ref()
        .or(config_file.tome.model.as_ref())
        .or(provider_config.models.first())
        .cloned()
        .ok_or_else(|| missing("model", "--model <name>"))?;

    if !provider_config.models.is_empty() && !provider_config.models.contains(&model) {
        tracing::warn!(
            model = %model,
            provider = %provider_name,
            configured = %provider_config.models.join(", "),
            "Model is not in the configured models list, proceeding anyway"
        );
    }

    let target_language = options
        .to
        .as_ref()
        .or(config_file.tome.to.as_ref())
        .ok_or_else(|| missing("to", "--to <lang>"))
        .and_then(|lang| resolve_language(lang))?;

    let source_language = options
        .from
        .as_ref()
        .or(config_file.tome.from.as_ref())
        .map_or_else(
            || Ok(DEFAULT_SOURCE_LANGUAGE.to_string()),
            |lang| resolve_language(lang),
        )?;

    let api_key = provider_config.api_key(credentials);
    if provider_config.requires_api_key() && api_key.is_none() {
        let env_var = provider_config.api_key_env.as_deref().unwrap_or("API_KEY");
        bail!(
            "Provider '{provider_name}' requires an API key\n\n\
             Set the {env_var} environment variable:\n  \
             export {env_var}=\"your-api-key\"\n\n\
             Or set api_key_env / api_key in ~/.config/tome/config.toml"
        );
    }

    let provider = ProviderSettings {
        name: provider_name.clone(),
        kind: provider_config.kind,
        endpoint: provider_config.endpoint().to_string(),
        api_key,
    };
    validate_settings(&provider)
        .with_context(|| format!("Invalid settings for provider '{provider_name}'"))?;

    Ok(ResolvedConfig {
        provider,
        model,
        source_language,
        target_language,
        temperature: provider_config.temperature,
        max_tokens: provider_config.max_tokens,
        cost_per_1k_tokens: config_file
            .tome
            .cost_per_1k_tokens
            .unwrap_or(DEFAULT_COST_PER_1K_TOKENS),
    })
}

fn missing(key: &str, flag: &str) -> anyhow::Error {
    anyhow!(
        "Missing required configuration: '{key}'\n\n\
         Please provide it via:\n  \
         - CLI option: tome {flag}\n  \
         - Config file: ~/.config/tome/config.toml"
    )
}

fn provider_not_found(name: &str, config_file: &ConfigFile) -> anyhow::Error {
    if config_file.providers.is_empty() {
        return anyhow!(
            "Provider '{name}' not found\n\n\
             No providers configured. Add providers to ~/.config/tome/config.toml"
        );
    }

    let available: Vec<&str> = config_file.providers.keys().map(String::as_str).collect();
    anyhow!(
        "Provider '{name}' not found\n\n\
         Available providers:\n  \
         - {}\n\n\
         Add providers to ~/.config/tome/config.toml",
        available.join("\n  - ")
    )
}

/// Loads and saves the config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Config manager for `$XDG_CONFIG_HOME/tome/config.toml`, or
    /// `~/.config/tome/config.toml` when `XDG_CONFIG_HOME` is not set.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: paths::config_file()?,
        })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<ConfigFile> {
        let contents = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        toml::from_str(&contents).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })
    }

    /// Loads the config file, treating a missing file as an empty config.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(&self) -> Result<ConfigFile> {
        if self.config_path.exists() {
            self.load()
        } else {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            Ok(ConfigFile::default())
        }
    }
}
