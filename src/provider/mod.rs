//! Provider clients.
//!
//! One [`TranslationProvider`] contract over a closed set of remote APIs
//! ([`ProviderKind`]). Each implementation owns its wire format and hands back
//! the same [`TranslationResponse`] and [`StreamingChunk`] shapes.

mod anthropic;
mod gemini;
mod http;
mod ollama;
mod openai;
mod stream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProviderError, ProviderResult};
use crate::glossary::extraction::{build_extraction_prompt, parse_extracted_entries};
use crate::glossary::{GlossaryEntry, GlossaryExtractionRequest};

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use stream::ChunkStream;

/// A single prompt sent to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl TranslationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A complete, non-streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResponse {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub model: String,
    pub finish_reason: Option<String>,
}

impl TranslationResponse {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

/// One normalized piece of a streamed reply.
///
/// Token counts are only filled in when the provider reports them, which for
/// most providers means the final chunk only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamingChunk {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub finish_reason: Option<String>,
    pub is_final: bool,
}

impl StreamingChunk {
    pub fn delta(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }

    pub const fn final_chunk(
        text: String,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            text,
            input_tokens,
            output_tokens,
            finish_reason,
            is_final: true,
        }
    }
}

/// The supported provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions and compatible servers.
    #[serde(alias = "openai-compatible")]
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Hosted APIs that always need a key. OpenAI-compatible local servers
    /// usually do not, so `OpenAi` only needs one when it is configured.
    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::Anthropic | Self::Gemini)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to construct a provider client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Configured provider name, used in messages.
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Uniform contract over all provider APIs.
///
/// `translate` and `stream_translate` are required; the remaining
/// capabilities default to [`ProviderError::ServiceNotImplemented`].
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse>;

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream>;

    async fn count_tokens(&self, _text: &str, _model: &str) -> ProviderResult<u32> {
        Err(ProviderError::not_implemented("token counting"))
    }

    async fn fetch_available_models(&self) -> ProviderResult<Vec<String>> {
        Err(ProviderError::not_implemented("model listing"))
    }

    /// Asks the model for new glossary entries found in `request.text`.
    async fn extract_glossary(
        &self,
        request: &GlossaryExtractionRequest,
    ) -> ProviderResult<Vec<GlossaryEntry>> {
        let mut prompt_request =
            TranslationRequest::new(build_extraction_prompt(request), request.model.clone());
        prompt_request.temperature = Some(0.0);

        let response = self.translate(&prompt_request).await?;
        parse_extracted_entries(&response.text, &request.known_terms)
    }
}

/// Checks that the endpoint is a usable http(s) URL and that hosted APIs
/// have a key.
pub fn validate_settings(settings: &ProviderSettings) -> ProviderResult<()> {
    http::parse_endpoint(&settings.endpoint)?;

    let has_key = settings
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if settings.kind.requires_api_key() && !has_key {
        return Err(ProviderError::ApiKeyMissing(settings.name.clone()));
    }
    Ok(())
}

/// Constructs the client for `settings`, validating endpoint and credentials.
pub fn build_provider(settings: &ProviderSettings) -> ProviderResult<Box<dyn TranslationProvider>> {
    validate_settings(settings)?;
    let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());

    tracing::debug!(
        provider = %settings.name,
        kind = %settings.kind,
        endpoint = %settings.endpoint,
        "Building provider client"
    );

    let endpoint = settings.endpoint.clone();
    Ok(match (settings.kind, api_key) {
        (ProviderKind::OpenAi, api_key) => Box::new(OpenAiProvider::new(endpoint, api_key)),
        (ProviderKind::Anthropic, Some(api_key)) => {
            Box::new(AnthropicProvider::new(endpoint, api_key))
        }
        (ProviderKind::Gemini, Some(api_key)) => Box::new(GeminiProvider::new(endpoint, api_key)),
        (ProviderKind::Ollama, _) => Box::new(OllamaProvider::new(endpoint)),
        (ProviderKind::Anthropic | ProviderKind::Gemini, None) => {
            return Err(ProviderError::ApiKeyMissing(settings.name.clone()));
        }
    })
}
