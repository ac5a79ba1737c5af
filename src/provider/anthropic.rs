//! Anthropic Messages API. Streams as typed SSE events; input tokens arrive
//! on `message_start`, output tokens and the stop reason on `message_delta`.

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

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    MessageStart {
        message: StartMessage,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<ResponseUsage>,
    },
    MessageStop,
    Error {
        error: StreamErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: http_client(),
            endpoint,
            api_key,
        }
    }

    fn messages_request(request: &TranslationRequest, stream: bool) -> MessagesRequest<'_> {
        MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            stream,
        }
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    async fn post_messages(
        &self,
        request: &TranslationRequest,
        stream: bool,
    ) -> ProviderResult<reqwest::Response> {
        let url = endpoint_url(&self.endpoint, "v1/messages")?;
        let body = Self::messages_request(request, stream);

        tracing::debug!(model = %request.model, stream, "Sending messages request");
        let response = self
            .with_headers(self.client.post(url).json(&body))
            .send()
            .await?;

        ensure_success(response).await
    }
}

#[async_trait]
impl TranslationProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<TranslationResponse> {
        let response = self.post_messages(request, false).await?;
        let body: MessagesResponse = decode_json(response).await?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(ProviderError::NoResponseText);
        }

        let usage = body.usage.unwrap_or_default();
        Ok(TranslationResponse {
            text,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            model: body.model.unwrap_or_else(|| request.model.clone()),
            finish_reason: body.stop_reason,
        })
    }

    async fn stream_translate(&self, request: &TranslationRequest) -> ProviderResult<ChunkStream> {
        let response = self.post_messages(request, true).await?;
        Ok(spawn_chunk_stream(
            response.bytes_stream(),
            AnthropicDecoder::default(),
        ))
    }

    async fn count_tokens(&self, text: &str, model: &str) -> ProviderResult<u32> {
        let url = endpoint_url(&self.endpoint, "v1/messages/count_tokens")?;
        let body = CountTokensRequest {
            model,
            messages: [Message {
                role: "user",
                content: text,
            }],
        };

        let response = self
            .with_headers(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;
        let response = ensure_success(response)
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;
        let counted: CountTokensResponse = decode_json(response)
            .await
            .map_err(|e| ProviderError::TokenCountFailed(e.to_string()))?;

        Ok(counted.input_tokens)
    }
}

#[derive(Debug, Default)]
struct AnthropicDecoder {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    stop_reason: Option<String>,
}

impl AnthropicDecoder {
    fn final_chunk(&mut self) -> StreamingChunk {
        StreamingChunk::final_chunk(
            String::new(),
            self.input_tokens,
            self.output_tokens,
            self.stop_reason.take(),
        )
    }
}

impl EventDecoder for AnthropicDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error> {
        // `event:` lines repeat the type that is also inside the data payload
        let Some(data) = sse_data(line) else {
            return Ok(Decoded::Skip);
        };

        Ok(match serde_json::from_str::<StreamEvent>(data)? {
            StreamEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.input_tokens = usage.input_tokens;
                }
                Decoded::Skip
            }
            StreamEvent::ContentBlockDelta { delta } => {
                delta.text.map_or(Decoded::Skip, Decoded::Delta)
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(reason);
                }
                if let Some(output) = usage.and_then(|u| u.output_tokens) {
                    self.output_tokens = Some(output);
                }
                Decoded::Skip
            }
            StreamEvent::MessageStop => Decoded::Finish(self.final_chunk()),
            StreamEvent::Error { error } => Decoded::Fail(ProviderError::ApiError {
                status_code: if error.kind == "overloaded_error" { 529 } else { 500 },
                message: error.message,
            }),
            StreamEvent::Other => Decoded::Skip,
        })
    }

    fn finish_on_eof(&mut self) -> StreamingChunk {
        self.final_chunk()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::stream::tests::{bytes_of, collect};
    use super::*;

    const STREAM: &[&str] = &[
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":25,\"output_tokens\":1}}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\ndata: {\"type\": \"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Bon\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"jour\"}}\n\n",
        "event: message_delta\n",
        "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":15}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    ];

    #[tokio::test]
    async fn test_stream_normalizes_events() {
        let items = collect(spawn_chunk_stream(bytes_of(STREAM), AnthropicDecoder::default())).await;
        let chunks: Vec<StreamingChunk> = items.into_iter().map(Result::unwrap).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Bon");
        assert_eq!(chunks[1].text, "jour");
        assert!(chunks[0].input_tokens.is_none());

        let last = &chunks[2];
        assert!(last.is_final);
        assert_eq!(last.input_tokens, Some(25));
        assert_eq!(last.output_tokens, Some(15));
        assert_eq!(last.finish_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn test_stream_error_event_aborts() {
        let body = [
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n",
            "event: error\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"ignored\"}}\n",
        ];
        let items = collect(spawn_chunk_stream(bytes_of(&body), AnthropicDecoder::default())).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(
            &items[1],
            Err(ProviderError::ApiError { status_code: 529, message }) if message == "Overloaded"
        ));
    }

    #[test]
    fn test_messages_request_defaults_max_tokens() {
        let request = TranslationRequest::new("Hi", "claude-sonnet-4-5");
        let json = serde_json::to_value(AnthropicProvider::messages_request(&request, false)).unwrap();

        assert_eq!(json["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("stream").is_none());
        assert!(json.get("temperature").is_none());
    }
}
