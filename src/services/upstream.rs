//! Upstream transport
//!
//! Defines the Upstream trait the relay forwards through, and its reqwest
//! implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use bytes::Bytes;
use futures::StreamExt;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of body chunks
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Headers that describe one connection and are never forwarded
const HOP_BY_HOP_HEADERS: [HeaderName; 6] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::HOST,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

/// A request about to leave the relay
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// An upstream response with a still-streaming body
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Bytes>,
}

impl UpstreamResponse {
    /// Whether the body is a server-sent event stream
    pub fn is_event_stream(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("event-stream"))
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Transport the relay forwards requests through
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send a request and return the response without reading its body
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse>;
}

/// Copy headers, leaving out hop-by-hop ones
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in &HOP_BY_HOP_HEADERS {
        forwarded.remove(name);
    }
    forwarded
}

/// reqwest-backed upstream
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl HttpUpstream {
    /// Create a new upstream with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_timeouts(30, 300)
    }

    /// Create a new upstream with custom timeouts
    pub fn with_timeouts(timeout_secs: u64, stream_timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("reasoning-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let stream_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(stream_timeout_secs))
            .user_agent(concat!("reasoning-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create streaming HTTP client")?;

        Ok(Self {
            client,
            stream_client,
        })
    }

    /// Whether the request body asks for a streamed response
    fn wants_stream(body: &[u8]) -> bool {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|request| request.get("stream").and_then(serde_json::Value::as_bool))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse> {
        let client = if Self::wants_stream(&request.body) {
            &self.stream_client
        } else {
            &self.client
        };

        debug!("Forwarding {} {}", request.method, request.url);

        let response = client
            .request(request.method, &request.url)
            .headers(forwardable_headers(&request.headers))
            .body(request.body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", request.url))?;

        let status = response.status();
        let headers = forwardable_headers(response.headers());
        debug!("Upstream responded with {}", status);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.context("Upstream stream error"));

        Ok(UpstreamResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_creation() {
        assert!(HttpUpstream::new().is_ok());
    }

    #[test]
    fn test_wants_stream() {
        assert!(HttpUpstream::wants_stream(br#"{"stream": true}"#));
        assert!(!HttpUpstream::wants_stream(br#"{"stream": false}"#));
        assert!(!HttpUpstream::wants_stream(b"{}"));
        assert!(!HttpUpstream::wants_stream(b"garbage"));
    }

    #[test]
    fn test_forwardable_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer sk-test".parse().unwrap());
        headers.insert(header::HOST, "localhost:8082".parse().unwrap());
        headers.insert(header::CONTENT_LENGTH, "12".parse().unwrap());

        let forwarded = forwardable_headers(&headers);
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_is_event_stream() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/event-stream; charset=utf-8".parse().unwrap());
        let response = UpstreamResponse {
            status: StatusCode::OK,
            headers,
            body: Box::pin(futures::stream::empty::<Result<Bytes>>()),
        };
        assert!(response.is_event_stream());
    }
}
