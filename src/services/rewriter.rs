//! Request and response body interception
//!
//! Puts remembered fields back into assistant history messages of an outgoing
//! request, and remembers the message of a complete (non-streaming) response

use crate::models::Message;
use crate::services::reasoning_cache::ReasoningCache;
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, warn};

/// Rewrite an outgoing chat-completions body.
///
/// Returns the new body when at least one assistant message received fields,
/// `None` when the original bytes should be sent unchanged.
pub fn rewrite_request_body(body: &[u8], cache: &ReasoningCache) -> Option<Bytes> {
    let mut request: Value = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Outgoing body is not JSON, leaving it untouched: {}", e);
            return None;
        }
    };

    let Some(messages) = request.get_mut("messages").and_then(Value::as_array_mut) else {
        debug!("Outgoing body has no messages array, leaving it untouched");
        return None;
    };

    debug!("📤 Outgoing messages: {}", messages.len());
    let injections = inject_cached_fields(messages, cache);
    if injections == 0 {
        debug!("❌ No injections performed");
        return None;
    }

    debug!("🎯 Total injections: {}", injections);
    match serde_json::to_vec(&request) {
        Ok(rewritten) => Some(Bytes::from(rewritten)),
        Err(e) => {
            warn!("Failed to serialize rewritten request, sending original: {}", e);
            None
        }
    }
}

/// Merge cached fields into every assistant message that lacks them.
///
/// Keys already present on a message are kept. Returns the number of messages
/// that received at least one field.
pub fn inject_cached_fields(messages: &mut [Value], cache: &ReasoningCache) -> usize {
    let mut injections = 0;

    for value in messages.iter_mut() {
        let Some(message) = Message::from_value(value) else {
            continue;
        };
        if !message.is_assistant() {
            continue;
        }
        let Some(fields) = cache.lookup_and_strip(&message) else {
            continue;
        };
        let Some(object) = value.as_object_mut() else {
            continue;
        };

        let mut injected = false;
        for (name, field) in fields {
            if !object.contains_key(&name) {
                object.insert(name, field);
                injected = true;
            }
        }
        if injected {
            injections += 1;
        }
    }

    injections
}

/// Remember the first choice's message of a complete response body
pub fn remember_response_body(body: &[u8], cache: &ReasoningCache) {
    let response: Value = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(e) => {
            debug!("❌ Non-stream parse error: {}", e);
            return;
        }
    };

    let Some(message) = response
        .pointer("/choices/0/message")
        .and_then(Message::from_value)
    else {
        debug!("Response has no first choice message");
        return;
    };

    if message.is_cacheable() {
        debug!("📦 Non-stream message with extra fields");
        cache.remember(&message);
    } else {
        debug!("📦 No extra fields - skipping cache");
    }
}
