//! Google Gemini `generateContent`. Streams as SSE (`alt=sse`); the event that
//! carries a `finishReason` ends the stream and holds the usage metadata.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::http::{decode_json, endpoint_url, ensure_success, http_client};
use super::stream::{Decoded, EventDecoder, spawn_chunk_stream, sse_data};
use super::{
    ChunkStream, ProviderKind, StreamingChunk, TranslationProvider, TranslationRequest,
    TranslationResponse,
};
use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn finish_reason(&self) -> Option<String> {
        self.candidates.first().and_then(|c| c.finish_reason.clone())
    }
}

pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: http_client(),
            endpoint,
            api_key,
        }
    }

    fn generate_request(request: &TranslationRequest) -> GenerateContentRequest<'_> {
        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            });

        GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config,
        }
    }

    fn with_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("x-goog-api-key", &self.api_key)
    }

    fn model_path(model: &str, method: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("v1beta/models/{model}:{method}")
    }
}

#[async_trait]
impl TranslationProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse> {
        let url = endpoint_url(
            &self.endpoint,
            &Self::model_path(&request.model, "generateContent"),
        )?;
        let body = Self::generate_request(request);

        tracing::debug!(model = %request.model, "Sending generateContent request");
        let response = self
            .with_key(self.client.post(url).json(&body))
            .send()
            .await?;
        let body: GenerateContentResponse = decode_json(ensure_success(response).await?).await?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(ProviderError::NoResponseText);
        }

        Ok(TranslationResponse {
            finish_reason: body.finish_reason(),
            input_tokens: body.usage_metadata.and_then(|u| u.prompt_token_count),
            output_tokens: body.usage_metadata.and_then(|u| u.candidates_token_count),
            model: body.model_version.unwrap_or_else(|| request.model.clone()),
            text,
        })
    }

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream> {
        let path = format!(
            "{}?alt=sse",
            Self::model_path(&request.model, "streamGenerateContent")
        );
        let url = endpoint_url(&self.endpoint, &path)?;
        let body = Self::generate_request(request);

        tracing::debug!(model = %request.model, "Sending streamGenerateContent request");
        let response = self
            .with_key(self.client.post(url).json(&body))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(spawn_chunk_stream(
            response.bytes_stream(),
            GeminiDecoder::default(),
        ))
    }

    async fn count_tokens(&self, text: &str, model: &str) -> ProviderResult<u32> {
        let url = endpoint_url(&self.endpoint, &Self::model_path(model, "countTokens"))?;
        let request = TranslationRequest::new(text, model);
        let body = serde_json::json!({ "contents": Self::generate_request(&request).contents });

        let response = self
            .with_key(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;
        let response = ensure_success(response)
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;
        let counted: CountTokensResponse = decode_json(response)
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;

        Ok(counted.total_tokens)
    }

    async fn fetch_available_models(&self) -> ProviderResult<Vec<String>> {
        let url = endpoint_url(&self.endpoint, "v1beta/models")?;
        let response = self.with_key(self.client.get(url)).send().await?;
        let list: ModelList = decode_json(ensure_success(response).await?).await?;

        let mut models: Vec<String> = list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods.is_empty()
                    || m
                        .supported_generation_methods
                        .iter()
                        .any(|method| method == "generateContent")
            })
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect();
        models.sort();
        Ok(models)
    }
}

#[derive(Debug, Default)]
struct GeminiDecoder {
    usage: Option<UsageMetadata>,
}

impl EventDecoder for GeminiDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error> {
        let Some(data) = sse_data(line) else {
            return Ok(Decoded::Skip);
        };

        let event: GenerateContentResponse = serde_json::from_str(data)?;
        if event.usage_metadata.is_some() {
            self.usage = event.usage_metadata;
        }

        let text = event.text();
        Ok(match event.finish_reason() {
            Some(reason) => Decoded::Finish(StreamingChunk::final_chunk(
                text,
                self.usage.and_then(|u| u.prompt_token_count),
                self.usage.and_then(|u| u.candidates_token_count),
                Some(reason),
            )),
            None if text.is_empty() => Decoded::Skip,
            None => Decoded::Delta(text),
        })
    }

    fn finish_on_eof(&mut self) -> StreamingChunk {
        StreamingChunk::final_chunk(
            String::new(),
            self.usage.and_then(|u| u.prompt_token_count),
            self.usage.and_then(|u| u.candidates_token_count),
            None,
        )
    }
}
