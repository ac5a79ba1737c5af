//! Secret lookup behind a small trait so key resolution can be tested
//! without touching the process environment.

use std::collections::HashMap;

/// Opaque key to secret lookup.
pub trait CredentialStore {
    /// Returns the secret stored under `key`, if any. Empty secrets count as
    /// missing.
    fn secret(&self, key: &str) -> Option<String>;
}

/// Reads secrets from environment variables; `key` is the variable name.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn secret(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory secrets, e.g. keys collected from the config file.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    secrets: HashMap<String, String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), secret.into());
        self
    }
}

impl CredentialStore for MemoryCredentials {
    fn secret(&self, key: &str) -> Option<String> {
        self.secrets
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}
