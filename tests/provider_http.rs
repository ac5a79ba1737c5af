#![allow(clippy::unwrap_used)]
//! Provider clients against a loopback HTTP stub.

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tome_cli::error::ProviderError;
use tome_cli::provider::{
    ProviderKind, ProviderSettings, StreamingChunk, TranslationRequest, build_provider,
};

/// Serves exactly one response and hands back the raw request it received.
async fn serve_once(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });

    (endpoint, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

fn settings(kind: ProviderKind, endpoint: String, api_key: Option<&str>) -> ProviderSettings {
    ProviderSettings {
        name: "stub".to_string(),
        kind,
        endpoint,
        api_key: api_key.map(str::to_string),
    }
}

fn request() -> TranslationRequest {
    let mut request = TranslationRequest::new("Translate: Hello", "test-model");
    request.temperature = Some(0.2);
    request
}

#[tokio::test]
async fn test_ollama_ndjson_stream() {
    let body = "{\"response\":\"こん\",\"done\":false}\n\
                {\"response\":\"にちは\",\"done\":false}\n\
                {\"response\":\"\",\"done\":true,\"done_reason\":\"stop\",\"prompt_eval_count\":12,\"eval_count\":3}\n";
    let (endpoint, server) = serve_once("200 OK", "application/x-ndjson", body).await;

    let provider = build_provider(&settings(ProviderKind::Ollama, endpoint, None)).unwrap();
    let chunks: Vec<StreamingChunk> = provider
        .stream_translate(&request())
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(text, "こんにちは");
    let last = chunks.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.input_tokens, Some(12));
    assert_eq!(last.output_tokens, Some(3));
    assert_eq!(chunks.iter().filter(|c| c.is_final).count(), 1);

    let raw_request = server.await.unwrap();
    assert!(raw_request.starts_with("POST /api/generate"));
    assert!(raw_request.contains("\"stream\":true"));
}

#[tokio::test]
async fn test_openai_sse_stream_with_usage() {
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Bon\"}}]}\n\n\
                data: {\"choices\":[{\"delta\":{\"content\":\"jour\"}}]}\n\n\
                data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
                data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n\
                data: [DONE]\n\n";
    let (endpoint, server) = serve_once("200 OK", "text/event-stream", body).await;

    let provider =
        build_provider(&settings(ProviderKind::OpenAi, endpoint, Some("sk-test"))).unwrap();
    let chunks: Vec<StreamingChunk> = provider
        .stream_translate(&request())
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;

    let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(text, "Bonjour");
    let last = chunks.last().unwrap();
    assert_eq!(last.finish_reason.as_deref(), Some("stop"));
    assert_eq!(last.input_tokens, Some(9));
    assert_eq!(last.output_tokens, Some(2));

    let raw_request = server.await.unwrap().to_lowercase();
    assert!(raw_request.starts_with("post /v1/chat/completions"));
    assert!(raw_request.contains("authorization: bearer sk-test"));
    assert!(raw_request.contains("\"include_usage\":true"));
}

#[tokio::test]
async fn test_openai_error_status_maps_to_api_error() {
    let (endpoint, _server) = serve_once(
        "401 Unauthorized",
        "application/json",
        "{\"error\":{\"message\":\"Incorrect API key provided\",\"type\":\"invalid_request_error\"}}",
    )
    .await;

    let provider = build_provider(&settings(ProviderKind::OpenAi, endpoint, Some("bad"))).unwrap();
    let result = provider.translate(&request()).await;

    assert!(matches!(
        result,
        Err(ProviderError::ApiError { status_code: 401, ref message }) if message == "Incorrect API key provided"
    ));
}

#[tokio::test]
async fn test_anthropic_translate_and_headers() {
    let body = "{\"id\":\"msg_1\",\"type\":\"message\",\"role\":\"assistant\",\"model\":\"claude-test\",\
                \"content\":[{\"type\":\"text\",\"text\":\"Hallo\"}],\"stop_reason\":\"end_turn\",\
                \"usage\":{\"input_tokens\":11,\"output_tokens\":2}}";
    let (endpoint, server) = serve_once("200 OK", "application/json", body).await;

    let provider =
        build_provider(&settings(ProviderKind::Anthropic, endpoint, Some("sk-ant"))).unwrap();
    let response = provider.translate(&request()).await.unwrap();

    assert_eq!(response.text, "Hallo");
    assert_eq!(response.total_tokens(), 13);
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));

    let raw_request = server.await.unwrap().to_lowercase();
    assert!(raw_request.starts_with("post /v1/messages"));
    assert!(raw_request.contains("x-api-key: sk-ant"));
    assert!(raw_request.contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_no_response_text() {
    let (endpoint, _server) = serve_once("200 OK", "application/json", "{\"candidates\":[]}").await;

    let provider =
        build_provider(&settings(ProviderKind::Gemini, endpoint, Some("g-key"))).unwrap();
    let result = provider.translate(&request()).await;

    assert!(matches!(result, Err(ProviderError::NoResponseText)));
}

#[tokio::test]
async fn test_malformed_body_is_decoding_error() {
    let (endpoint, _server) = serve_once("200 OK", "application/json", "{not json").await;

    let provider = build_provider(&settings(ProviderKind::Ollama, endpoint, None)).unwrap();
    let result = provider.translate(&request()).await;

    assert!(matches!(result, Err(ProviderError::ResponseDecodingFailed(_))));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let provider = build_provider(&settings(ProviderKind::Ollama, endpoint, None)).unwrap();
    let result = provider.translate(&request()).await;

    assert!(matches!(result, Err(ProviderError::Transport(_))));
}
