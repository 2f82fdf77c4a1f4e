//! Chat completions relay handler
//!
//! Forwards chat-completion calls to the configured provider. For endpoints
//! that participate in reasoning preservation, remembered fields are put back
//! into the outgoing history and the response message is remembered.

use crate::config::ProviderConfig;
use crate::handlers::AppState;
use crate::services::upstream::{forwardable_headers, BoxStream, UpstreamRequest};
use crate::services::{remember_response_body, rewrite_request_body, ReasoningStream};
use crate::utils::error::{AppError, AppResult};
use crate::utils::logging::summarize_message;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    response::Response,
};
use bytes::BytesMut;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Relay a chat completion request
///
/// POST /{provider}/chat/completions
/// POST /{provider}/v1/chat/completions
pub async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let provider = state
        .config
        .provider(&provider_name)
        .ok_or_else(|| AppError::UnknownProvider(provider_name.clone()))?;

    let url = provider.chat_completions_url();
    let participates = state.config.participates(&url);
    debug!("Relaying to {} (reasoning preservation: {})", url, participates);

    let body = if participates {
        log_history(&body);
        rewrite_request_body(&body, &state.cache).unwrap_or(body)
    } else {
        body
    };

    let request = UpstreamRequest {
        method: Method::POST,
        url,
        headers: outgoing_headers(&headers, provider)?,
        body,
    };
    let response = state.upstream.send(request).await?;

    let status = response.status;
    let event_stream = response.is_event_stream();
    let response_headers = response.headers;

    let body = if !participates {
        Body::from_stream(response.body)
    } else if event_stream {
        debug!("🌀 Handling streaming response");
        Body::from_stream(ReasoningStream::new(response.body, state.cache.clone()))
    } else {
        let collected = collect_body(response.body).await?;
        remember_response_body(&collected, &state.cache);
        Body::from(collected)
    };

    info!("Relayed {} response for provider '{}'", status, provider_name);

    let mut relayed = Response::new(body);
    *relayed.status_mut() = status;
    *relayed.headers_mut() = response_headers;
    Ok(relayed)
}

/// Headers for the upstream call: client headers minus hop-by-hop and
/// compression negotiation, plus provider credentials and custom headers
fn outgoing_headers(headers: &HeaderMap, provider: &ProviderConfig) -> AppResult<HeaderMap> {
    let mut outgoing = forwardable_headers(headers);
    // Bodies are inspected, so ask for them uncompressed
    outgoing.remove(header::ACCEPT_ENCODING);

    if !provider.api_key.is_empty() {
        let value = HeaderValue::from_str(&format!("Bearer {}", provider.api_key))
            .map_err(|e| AppError::Config(format!("Invalid provider API key: {}", e)))?;
        outgoing.insert(header::AUTHORIZATION, value);
    }

    for (name, value) in &provider.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::Config(format!("Invalid header value for '{}': {}", name, e)))?;
        outgoing.insert(name, value);
    }

    Ok(outgoing)
}

async fn collect_body(mut body: BoxStream<'static, Bytes>) -> anyhow::Result<Bytes> {
    let mut collected = BytesMut::new();
    while let Some(chunk) = body.next().await {
        collected.extend_from_slice(&chunk?);
    }
    Ok(collected.freeze())
}

fn log_history(body: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let Ok(request) = serde_json::from_slice::<Value>(body) else {
        return;
    };
    if let Some(messages) = request.get("messages").and_then(Value::as_array) {
        let summaries: Vec<Value> = messages.iter().map(summarize_message).collect();
        if let Ok(summary_json) = serde_json::to_string_pretty(&summaries) {
            debug!("📥 Client history:\n{}", summary_json);
        }
    }
}
