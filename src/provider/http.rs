//! HTTP plumbing shared by the provider clients.

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

pub(crate) fn parse_endpoint(endpoint: &str) -> ProviderResult<Url> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| ProviderError::InvalidUrl(format!("{endpoint}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::InvalidUrl(format!(
            "{endpoint}: unsupported scheme '{}'",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Joins `path` (which may carry a query string) onto the endpoint base.
pub(crate) fn endpoint_url(endpoint: &str, path: &str) -> ProviderResult<Url> {
    let joined = format!(
        "{}/{}",
        endpoint.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    parse_endpoint(&joined)
}

/// Turns a non-success status into [`ProviderError::ApiError`].
pub(crate) async fn ensure_success(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "Provider returned an error status");

    Err(ProviderError::ApiError {
        status_code: status.as_u16(),
        message: error_message(&body),
    })
}

/// Reads and deserializes a JSON body.
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ProviderError::decoding)
}

/// Pulls a readable message out of the error bodies the providers send.
pub(crate) fn error_message(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "(empty response body)".to_string();
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("message"))
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string)
}
