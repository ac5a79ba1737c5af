//! Ollama `/api/generate`. Streams newline-delimited JSON; the object with
//! `done: true` ends the stream and is the only one with reliable counts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{decode_json, endpoint_url, ensure_success, http_client};
use super::stream::{Decoded, EventDecoder, spawn_chunk_stream};
use super::{
    ChunkStream, ProviderKind, StreamingChunk, TranslationProvider, TranslationRequest,
    TranslationResponse,
};
use crate::error::{ProviderError, ProviderResult};
use crate::translation::estimate_tokens;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Debug, Deserialize)]
struct TagInfo {
    name: String,
}

pub struct OllamaProvider {
    client: Client,
    endpoint: String,
}

impl OllamaProvider {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: http_client(),
            endpoint,
        }
    }

    fn generate_request(request: &TranslationRequest, stream: bool) -> GenerateRequest<'_> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then_some(
            GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        );

        GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream,
            options,
        }
    }

    async fn post_generate(
        &self,
        request: &TranslationRequest,
        stream: bool,
    ) -> ProviderResult<reqwest::Response> {
        let url = endpoint_url(&self.endpoint, "api/generate")?;
        let body = Self::generate_request(request, stream);

        tracing::debug!(model = %request.model, stream, "Sending generate request");
        let response = self.client.post(url).json(&body).send().await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl TranslationProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse> {
        let response = self.post_generate(request, false).await?;
        let body: GenerateResponse = decode_json(response).await?;

        if let Some(error) = body.error {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: error,
            });
        }
        if body.response.trim().is_empty() {
            return Err(ProviderError::NoResponseText);
        }

        Ok(TranslationResponse {
            text: body.response,
            input_tokens: body.prompt_eval_count,
            output_tokens: body.eval_count,
            model: body.model.unwrap_or_else(|| request.model.clone()),
            finish_reason: body.done_reason,
        })
    }

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream> {
        let response = self.post_generate(request, true).await?;
        Ok(spawn_chunk_stream(response.bytes_stream(), OllamaDecoder))
    }

    async fn count_tokens(&self, text: &str, _model: &str) -> ProviderResult<u32> {
        Ok(estimate_tokens(text))
    }

    async fn fetch_available_models(&self) -> ProviderResult<Vec<String>> {
        let url = endpoint_url(&self.endpoint, "api/tags")?;
        let response = self.client.get(url).send().await?;
        let tags: TagList = decode_json(ensure_success(response).await?).await?;

        let mut models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        models.sort();
        Ok(models)
    }
}

struct OllamaDecoder;

impl EventDecoder for OllamaDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error> {
        let event: GenerateResponse = serde_json::from_str(line)?;

        if let Some(error) = event.error {
            return Ok(Decoded::Fail(ProviderError::ApiError {
                status_code: 500,
                message: error,
            }));
        }

        Ok(if event.done {
            Decoded::Finish(StreamingChunk::final_chunk(
                event.response,
                event.prompt_eval_count,
                event.eval_count,
                event.done_reason.or_else(|| Some("stop".to_string())),
            ))
        } else {
            Decoded::Delta(event.response)
        })
    }

    fn finish_on_eof(&mut self) -> StreamingChunk {
        StreamingChunk::final_chunk(String::new(), None, None, None)
    }
}
