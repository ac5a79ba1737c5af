//! Stream normalization.
//!
//! Every provider turns its HTTP body into lines (SSE or NDJSON), decodes
//! each line with its own [`EventDecoder`], and pushes the resulting
//! [`StreamingChunk`]s through a bounded channel. The consumer side is a
//! [`ChunkStream`], which ends after exactly one final chunk or one error.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::StreamingChunk;
use crate::error::{ProviderError, ProviderResult};

const CHANNEL_CAPACITY: usize = 64;

/// What a single framed line meant to the provider decoder.
#[derive(Debug)]
pub(crate) enum Decoded {
    /// Nothing to emit (keep-alives, comments, metadata-only events).
    Skip,
    /// An intermediate text fragment.
    Delta(String),
    /// The terminal chunk; the producer stops after sending it.
    Finish(StreamingChunk),
    /// The provider reported an error inside the stream.
    Fail(ProviderError),
}

/// Provider-specific translation of framed lines into chunks.
pub(crate) trait EventDecoder: Send + 'static {
    fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error>;

    /// Final chunk to emit when the transport closes without an end marker.
    fn finish_on_eof(&mut self) -> StreamingChunk;
}

/// Returns the payload of an SSE `data:` line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

/// Splits a raw byte stream into trimmed, non-empty lines.
///
/// Bytes are buffered until a full line is available so multi-byte UTF-8
/// sequences split across network chunks survive. A transport error ends the
/// line stream with that error.
pub(crate) fn line_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = ProviderResult<String>> + Send {
    async_stream::stream! {
        let mut byte_stream = std::pin::pin!(byte_stream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ProviderError::Transport(e));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if !line.is_empty() {
                    yield Ok(line.to_string());
                }
            }
        }

        let rest = String::from_utf8_lossy(&buffer);
        let rest = rest.trim();
        if !rest.is_empty() {
            yield Ok(rest.to_string());
        }
    }
}

/// Spawns the producer task that feeds decoded chunks into a [`ChunkStream`].
pub(crate) fn spawn_chunk_stream<S, D>(byte_stream: S, mut decoder: D) -> ChunkStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    D: EventDecoder,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut lines = std::pin::pin!(line_stream(byte_stream));

        while let Some(line) = lines.next().await {
            if tx.is_closed() {
                tracing::debug!("Chunk consumer went away, stopping stream");
                return;
            }

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            match decoder.decode_line(&line) {
                Ok(Decoded::Skip) => {}
                Ok(Decoded::Delta(text)) => {
                    if text.is_empty() {
                        continue;
                    }
                    if tx.send(Ok(StreamingChunk::delta(text))).await.is_err() {
                        tracing::debug!("Chunk consumer went away, stopping stream");
                        return;
                    }
                }
                Ok(Decoded::Finish(chunk)) => {
                    let _ = tx.send(Ok(chunk)).await;
                    return;
                }
                Ok(Decoded::Fail(e)) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed stream event: {e}");
                }
            }
        }

        let _ = tx.send(Ok(decoder.finish_on_eof())).await;
    });

    ChunkStream { receiver: rx }
}

/// Ordered sequence of normalized chunks for one streaming translation.
pub struct ChunkStream {
    receiver: mpsc::Receiver<ProviderResult<StreamingChunk>>,
}

impl ChunkStream {
    /// Builds a stream from already known items, e.g. in offline providers.
    pub fn from_results(items: Vec<ProviderResult<StreamingChunk>>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // capacity covers every item
            let _ = tx.try_send(item);
        }
        Self { receiver: rx }
    }

    /// Waits for the next chunk. `None` once the producer has finished.
    pub async fn next_chunk(&mut self) -> Option<ProviderResult<StreamingChunk>> {
        self.receiver.recv().await
    }

    /// Stops the producer. Chunks already buffered can still be drained.
    pub fn cancel(&mut self) {
        self.receiver.close();
    }
}

impl Stream for ChunkStream {
    type Item = ProviderResult<StreamingChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use futures_util::stream;

    pub(crate) fn bytes_of(parts: &[&str]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let parts: Vec<reqwest::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(parts)
    }

    pub(crate) async fn collect(mut stream: ChunkStream) -> Vec<ProviderResult<StreamingChunk>> {
        let mut items = Vec::new();
        while let Some(item) = stream.next_chunk().await {
            items.push(item);
        }
        items
    }

    struct PlainDecoder;

    impl EventDecoder for PlainDecoder {
        fn decode_line(&mut self, line: &str) -> Result<Decoded, serde_json::Error> {
            match line {
                "END" => Ok(Decoded::Finish(StreamingChunk::final_chunk(
                    String::new(),
                    None,
                    None,
                    Some("stop".to_string()),
                ))),
                "BAD" => serde_json::from_str::<u8>("x").map(|_| Decoded::Skip),
                _ => Ok(Decoded::Delta(line.to_string())),
            }
        }

        fn finish_on_eof(&mut self) -> StreamingChunk {
            StreamingChunk::final_chunk(String::new(), None, None, None)
        }
    }

    #[tokio::test]
    async fn test_line_stream_reassembles_split_lines() {
        let lines: Vec<_> = line_stream(bytes_of(&["hel", "lo\nwor", "ld\n\n", "tail"]))
            .collect()
            .await;
        let lines: Vec<String> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines, vec!["hello", "world", "tail"]);
    }

    #[tokio::test]
    async fn test_line_stream_keeps_split_utf8() {
        let text = "こんにちは\n";
        let bytes = text.as_bytes();
        let parts: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..4])),
            Ok(Bytes::copy_from_slice(&bytes[4..])),
        ];
        let lines: Vec<_> = line_stream(stream::iter(parts)).collect().await;
        assert_eq!(lines[0].as_ref().unwrap(), "こんにちは");
    }

    #[tokio::test]
    async fn test_producer_stops_at_finish() {
        let stream = spawn_chunk_stream(bytes_of(&["A\nB\nEND\nC\n"]), PlainDecoder);
        let items = collect(stream).await;

        assert_eq!(items.len(), 3);
        let last = items[2].as_ref().unwrap();
        assert!(last.is_final);
        assert_eq!(last.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let stream = spawn_chunk_stream(bytes_of(&["A\nBAD\nB\nEND\n"]), PlainDecoder);
        let items = collect(stream).await;

        let texts: Vec<String> = items.into_iter().map(|c| c.unwrap().text).collect();
        assert_eq!(texts, vec!["A", "B", ""]);
    }

    #[tokio::test]
    async fn test_eof_emits_single_final_chunk() {
        let stream = spawn_chunk_stream(bytes_of(&["A\nB"]), PlainDecoder);
        let items = collect(stream).await;

        let finals = items
            .iter()
            .filter(|c| c.as_ref().is_ok_and(|c| c.is_final))
            .count();
        assert_eq!(items.len(), 3);
        assert_eq!(finals, 1);
    }

    async fn connection_refused() -> reqwest::Error {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        reqwest::Client::new().get(url).send().await.unwrap_err()
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream_aborts() {
        let parts: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from("A\nB\n")),
            Err(connection_refused().await),
            Ok(Bytes::from("C\nEND\n")),
        ];
        let stream = spawn_chunk_stream(stream::iter(parts), PlainDecoder);
        let items = collect(stream).await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().text, "A");
        assert_eq!(items[1].as_ref().unwrap().text, "B");
        assert!(matches!(items[2], Err(ProviderError::Transport(_))));
        assert!(!items.iter().any(|c| c.as_ref().is_ok_and(|c| c.is_final)));
    }

    #[tokio::test]
    async fn test_from_results_drains_in_order() {
        let stream = ChunkStream::from_results(vec![
            Ok(StreamingChunk::delta("x".to_string())),
            Err(ProviderError::NoResponseText),
        ]);
        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ProviderError::NoResponseText)));
    }

    #[test]
    fn test_sse_data() {
        assert_eq!(sse_data("data: {}"), Some("{}"));
        assert_eq!(sse_data("data:{}"), Some("{}"));
        assert_eq!(sse_data("event: ping"), None);
        assert_eq!(sse_data(": comment"), None);
    }
}
