//! Error types shared by the provider layer, the project aggregate and the pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by provider clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("API key missing for provider '{0}'")]
    ApiKeyMissing(String),

    #[error("API request failed with status {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to decode provider response: {0}")]
    ResponseDecodingFailed(String),

    #[error("Provider returned no response text")]
    NoResponseText,

    #[error("Not supported by this provider: {0}")]
    ServiceNotImplemented(String),

    #[error("Token counting failed: {0}")]
    TokenCountFailed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    pub(crate) fn decoding(cause: impl std::fmt::Display) -> Self {
        Self::ResponseDecodingFailed(cause.to_string())
    }

    pub(crate) fn not_implemented(feature: &str) -> Self {
        Self::ServiceNotImplemented(feature.to_string())
    }
}

/// Errors raised by project state transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("Chapter not found: {0}")]
    ChapterNotFound(Uuid),

    #[error("Version not found: {0}")]
    VersionNotFound(Uuid),

    #[error("Refusing to commit an empty translation")]
    EmptyTranslation,

    #[error("Chapter {0} has no current version to snapshot against")]
    NoCurrentVersion(Uuid),
}

/// Errors raised while running a translation through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Translation cancelled")]
    Cancelled,
}

pub type ProviderResult<T> = Result<T, ProviderError>;
