//! OpenAI chat completions (and compatible endpoints such as LM Studio,
//! OpenRouter or Ollama's `/v1` surface). Streams as SSE ending in `[DONE]`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::http::{decode_json, endpoint_url, ensure_success, http_client};
use super::stream::{Decoded, EventDecoder, sse_data, spawn_chunk_stream};
use super::{
    ChunkStream, ProviderKind, StreamingChunk, TranslationProvider, TranslationRequest,
    TranslationResponse,
};
use crate::error::{ProviderError, ProviderResult};
use crate::translation::estimate_tokens;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}

pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiProvider {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            endpoint,
            api_key,
        }
    }

    fn chat_request<'a>(request: &'a TranslationRequest, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &request.model,
            messages: vec![Message {
                role: "user",
                content: Cow::Borrowed(&request.prompt),
            }],
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // Add Authorization header if API key is present
        match &self.api_key {
            Some(api_key) => builder.header("Authorization", format!("Bearer {api_key}")),
            None => builder,
        }
    }

    async fn post_chat(
        &self,
        request: &TranslationRequest,
        stream: bool,
    ) -> ProviderResult<reqwest::Response> {
        let url = endpoint_url(&self.endpoint, "v1/chat/completions")?;
        let body = Self::chat_request(request, stream);

        tracing::debug!(model = %request.model, stream, "Sending chat completion request");
        let response = self
            .authorize(self.client.post(url).json(&body))
            .send()
            .await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl TranslationProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse> {
        let response = self.post_chat(request, false).await?;
        let body: ChatCompletionResponse = decode_json(response).await?;

        let choice = body.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let text = choice
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::NoResponseText)?;

        Ok(TranslationResponse {
            text,
            input_tokens: body.usage.and_then(|u| u.prompt_tokens),
            output_tokens: body.usage.and_then(|u| u.completion_tokens),
            model: body.model.unwrap_or_else(|| request.model.clone()),
            finish_reason,
        })
    }

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream> {
        let response = self.post_chat(request, true).await?;
        Ok(spawn_chunk_stream(
            response.bytes_stream(),
            OpenAiDecoder::default(),
        ))
    }

    async fn count_tokens(&self, text: &str, _model: &str) -> ProviderResult<u32> {
        Ok(estimate_tokens(text))
    }

    async fn fetch_available_models(&self) -> ProviderResult<Vec<String>> {
        let url = endpoint_url(&self.endpoint, "v1/models")?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let list: ModelList = decode_json(ensure_success(response).await?).await?;

        let mut models: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        models.sort();
        Ok(models)
    }
}

/// Collects `finish_reason` and usage, which arrive in separate events
/// before `[DONE]`.
#[derive(Debug, Default)]
struct OpenAiDecoder {
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl OpenAiDecoder {
    fn final_chunk(&mut self) -> StreamingChunk {
        StreamingChunk::final_chunk(
            String::new(),
            self.usage.and_then(|u| u.prompt_tokens),
            self.usage.and_then(|u| u.completion_tokens),
            self.finish_reason.take(),
        )
    }
}

impl EventDecoder for OpenAiDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error> {
        let Some(data) = sse_data(line) else {
            return Ok(Decoded::Skip);
        };
        if data == "[DONE]" {
            return Ok(Decoded::Finish(self.final_chunk()));
        }

        let event: StreamResponse = serde_json::from_str(data)?;
        if event.usage.is_some() {
            self.usage = event.usage;
        }

        let mut content = String::new();
        for choice in event.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            if let Some(text) = choice.delta.and_then(|d| d.content) {
                content.push_str(&text);
            }
        }

        Ok(if content.is_empty() {
            Decoded::Skip
        } else {
            Decoded::Delta(content)
        })
    }

    fn finish_on_eof(&mut self) -> StreamingChunk {
        self.final_chunk()
    }
}
