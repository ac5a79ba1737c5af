//! Configuration file management, provider settings and credential lookup.

mod credentials;
mod manager;

pub use credentials::{CredentialStore, EnvCredentials, MemoryCredentials};
pub use manager::{
    ConfigFile, ConfigManager, DEFAULT_SOURCE_LANGUAGE, ProviderConfig, ResolveOptions,
    ResolvedConfig, TomeConfig, resolve_config,
};
