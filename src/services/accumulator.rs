//! Stream delta accumulator
//!
//! Splits a chat-completion event stream into frames, hands every frame back
//! untouched and merges the JSON deltas into one logical message on the side.

use crate::models::{FunctionCall, Message, ToolCall};
use bytes::{Bytes, BytesMut};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Frame separator of the event stream
const FRAME_SEPARATOR: &[u8] = b"\n\n";

/// Payload marker a frame must start with to be considered for merging
const DATA_PREFIX: &[u8] = b"data:";

/// Payload marking the logical end of generation
const DONE_SENTINEL: &str = "[DONE]";

/// Why a frame was skipped for accumulation. Never surfaced to the consumer.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("frame payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("frame payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected frame shape: {0}")]
    UnexpectedShape(&'static str),
}

/// Shape category of a JSON value, as seen by the delta merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Text,
    Sequence,
    Fields,
    Scalar,
}

impl Shape {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Shape::Text,
            Value::Array(_) => Shape::Sequence,
            Value::Object(_) => Shape::Fields,
            Value::Null | Value::Bool(_) | Value::Number(_) => Shape::Scalar,
        }
    }
}

/// Merge one delta field into the accumulated value.
///
/// Text concatenates, sequences append, field sets shallow-merge with the
/// delta winning, anything else is replaced. An absent or null prior value
/// adopts the delta as is.
pub fn merge_field(prior: Option<&mut Value>, delta: Value) -> Option<Value> {
    let Some(prior) = prior.filter(|prior| !prior.is_null()) else {
        return Some(delta);
    };

    match (Shape::of(prior), Shape::of(&delta)) {
        (Shape::Text, Shape::Text) => {
            if let (Value::String(acc), Value::String(piece)) = (prior, delta) {
                acc.push_str(&piece);
            }
        }
        (Shape::Sequence, Shape::Sequence) => {
            if let (Value::Array(acc), Value::Array(items)) = (prior, delta) {
                acc.extend(items);
            }
        }
        (Shape::Fields, Shape::Fields) => {
            if let (Value::Object(acc), Value::Object(fields)) = (prior, delta) {
                for (name, value) in fields {
                    acc.insert(name, value);
                }
            }
        }
        _ => *prior = delta,
    }
    None
}

/// Tool call under construction, keyed by its index
#[derive(Debug, Clone, Default)]
struct ToolCallBuilder {
    id: String,
    call_type: String,
    name: String,
    arguments: String,
}

impl ToolCallBuilder {
    fn apply(&mut self, delta: &Value) {
        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            self.id.push_str(id);
        }
        if self.call_type.is_empty() {
            if let Some(call_type) = delta.get("type").and_then(Value::as_str) {
                self.call_type = call_type.to_string();
            }
        }
        if let Some(function) = delta.get("function") {
            if self.name.is_empty() {
                if let Some(name) = function.get("name").and_then(Value::as_str) {
                    self.name = name.to_string();
                }
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                self.arguments.push_str(arguments);
            }
        }
    }

    fn finish(self, index: u32) -> ToolCall {
        let call_type = if self.call_type.is_empty() {
            "function".to_string()
        } else {
            self.call_type
        };
        ToolCall {
            index: Some(index),
            id: self.id,
            call_type,
            function: FunctionCall {
                name: self.name,
                arguments: self.arguments,
            },
        }
    }
}

/// Result of a finished accumulation
#[derive(Debug)]
pub struct Finished {
    /// Unterminated bytes left in the buffer, forwarded as they arrived
    pub trailing: Option<Bytes>,
    /// The merged message
    pub message: Message,
}

/// Per-stream accumulation state
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: BytesMut,
    scan_from: usize,
    fields: Map<String, Value>,
    tool_calls: BTreeMap<u32, ToolCallBuilder>,
    done: bool,
    frames: usize,
    skipped_frames: usize,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk and get back every frame it completed, in order.
    ///
    /// Each returned frame carries its `\n\n` terminator, so concatenating
    /// all output reproduces the input byte for byte.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_separator(&self.buffer[self.scan_from..]) {
            let end = self.scan_from + pos + FRAME_SEPARATOR.len();
            let frame = self.buffer.split_to(end).freeze();
            self.scan_from = 0;
            self.accumulate_frame(&frame[..frame.len() - FRAME_SEPARATOR.len()]);
            frames.push(frame);
        }
        // A separator may straddle the next chunk boundary
        self.scan_from = self.buffer.len().saturating_sub(FRAME_SEPARATOR.len() - 1);
        frames
    }

    /// Finish the stream: flush the remainder and build the merged message
    pub fn finish(mut self) -> Finished {
        let trailing = if self.buffer.is_empty() {
            None
        } else {
            let rest = self.buffer.split().freeze();
            self.accumulate_frame(&rest);
            Some(rest)
        };

        debug!(
            "Stream accumulation finished: {} frames, {} skipped, {} tool calls",
            self.frames,
            self.skipped_frames,
            self.tool_calls.len()
        );

        let mut message = Message::from_fields(std::mem::take(&mut self.fields));
        if !self.tool_calls.is_empty() {
            // BTreeMap iteration yields calls ordered by index
            let calls = std::mem::take(&mut self.tool_calls)
                .into_iter()
                .map(|(index, builder)| builder.finish(index))
                .collect();
            message.tool_calls = Some(calls);
        }

        Finished { trailing, message }
    }

    /// Frames seen so far, forwarded or not
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Frames that carried a payload which could not be merged
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Whether the `[DONE]` sentinel was seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn accumulate_frame(&mut self, frame: &[u8]) {
        self.frames += 1;
        if self.done || !frame.starts_with(DATA_PREFIX) {
            return;
        }

        if let Err(e) = self.merge_frame(frame) {
            self.skipped_frames += 1;
            debug!("Stream frame skipped: {}", e);
        }
    }

    fn merge_frame(&mut self, frame: &[u8]) -> Result<(), FrameError> {
        let text = std::str::from_utf8(frame)?;
        let payload = text
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .unwrap_or_default();

        if payload == DONE_SENTINEL {
            self.done = true;
            return Ok(());
        }

        let event: Value = serde_json::from_str(payload)?;
        let delta = match event.pointer("/choices/0/delta") {
            None => return Ok(()),
            Some(Value::Object(delta)) => delta.clone(),
            Some(_) => return Err(FrameError::UnexpectedShape("delta is not an object")),
        };

        for (field, value) in delta {
            if field == "tool_calls" {
                self.apply_tool_call_deltas(&value)?;
                continue;
            }
            // Role is set once; providers that repeat it in every delta must not grow it
            if field == "role" && self.fields.get("role").is_some_and(|role| !role.is_null()) {
                continue;
            }
            let prior = self.fields.get_mut(&field);
            if let Some(adopted) = merge_field(prior, value) {
                self.fields.insert(field, adopted);
            }
        }
        Ok(())
    }

    fn apply_tool_call_deltas(&mut self, value: &Value) -> Result<(), FrameError> {
        let deltas = match value {
            Value::Array(deltas) => deltas,
            Value::Null => return Ok(()),
            _ => return Err(FrameError::UnexpectedShape("tool_calls is not an array")),
        };

        for delta in deltas.iter().filter(|delta| delta.is_object()) {
            let index = delta
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok())
                .unwrap_or(0);
            self.tool_calls.entry(index).or_default().apply(delta);
        }
        Ok(())
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(FRAME_SEPARATOR.len())
        .position(|window| window == FRAME_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(delta: Value) -> String {
        format!("data: {}\n\n", json!({"choices": [{"index": 0, "delta": delta}]}))
    }

    #[test]
    fn test_shape_categories() {
        assert_eq!(Shape::of(&json!("a")), Shape::Text);
        assert_eq!(Shape::of(&json!([1])), Shape::Sequence);
        assert_eq!(Shape::of(&json!({"a": 1})), Shape::Fields);
        assert_eq!(Shape::of(&json!(1)), Shape::Scalar);
        assert_eq!(Shape::of(&json!(null)), Shape::Scalar);
    }

    #[test]
    fn test_merge_field_rules() {
        let mut text = json!("Hel");
        assert!(merge_field(Some(&mut text), json!("lo")).is_none());
        assert_eq!(text, json!("Hello"));

        let mut seq = json!([1]);
        merge_field(Some(&mut seq), json!([2, 3]));
        assert_eq!(seq, json!([1, 2, 3]));

        let mut obj = json!({"a": 1, "b": 1});
        merge_field(Some(&mut obj), json!({"b": 2, "c": 3}));
        assert_eq!(obj, json!({"a": 1, "b": 2, "c": 3}));

        let mut mismatch = json!("text");
        merge_field(Some(&mut mismatch), json!(5));
        assert_eq!(mismatch, json!(5));

        let mut null = Value::Null;
        assert_eq!(merge_field(Some(&mut null), json!({"a": 1})), Some(json!({"a": 1})));
        assert_eq!(merge_field(None, json!("x")), Some(json!("x")));
    }

    #[test]
    fn test_frames_split_across_chunks() {
        let mut acc = StreamAccumulator::new();
        let input = frame(json!({"content": "héllo"}));
        let bytes = input.as_bytes();
        // Split inside the multi-byte character
        let split = input.find('é').unwrap() + 1;

        assert!(acc.feed(&bytes[..split]).is_empty());
        let frames = acc.feed(&bytes[split..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], bytes);

        let finished = acc.finish();
        assert!(finished.trailing.is_none());
        assert_eq!(finished.message.content_text(), "héllo");
    }

    #[test]
    fn test_several_frames_in_one_chunk() {
        let mut acc = StreamAccumulator::new();
        let input = format!(
            "{}{}: keep-alive\n\n",
            frame(json!({"role": "assistant", "content": "a"})),
            frame(json!({"content": "b"}))
        );
        let frames = acc.feed(input.as_bytes());
        assert_eq!(frames.len(), 3);
        assert_eq!(frames.concat(), input.as_bytes());
        assert_eq!(acc.frames(), 3);
        assert_eq!(acc.finish().message.content_text(), "ab");
    }

    #[test]
    fn test_done_stops_accumulation() {
        let mut acc = StreamAccumulator::new();
        let input = format!(
            "{}data: [DONE]\n\n{}",
            frame(json!({"content": "a"})),
            frame(json!({"content": "late"}))
        );
        assert_eq!(acc.feed(input.as_bytes()).len(), 3);
        assert!(acc.is_done());
        assert_eq!(acc.finish().message.content_text(), "a");
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let mut acc = StreamAccumulator::new();
        let input = format!("data: {{not json\n\n{}", frame(json!({"content": "ok"})));
        assert_eq!(acc.feed(input.as_bytes()).len(), 2);
        assert_eq!(acc.skipped_frames(), 1);
        assert_eq!(acc.finish().message.content_text(), "ok");
    }

    #[test]
    fn test_trailing_remainder_is_flushed() {
        let mut acc = StreamAccumulator::new();
        let tail = r#"data: {"choices":[{"delta":{"reasoning":"r"}}]}"#;
        assert!(acc.feed(tail.as_bytes()).is_empty());

        let finished = acc.finish();
        assert_eq!(finished.trailing.as_deref(), Some(tail.as_bytes()));
        assert_eq!(finished.message.extra["reasoning"], "r");
    }

    #[test]
    fn test_tool_call_type_defaults_to_function() {
        let mut acc = StreamAccumulator::new();
        acc.feed(frame(json!({"tool_calls": [{"index": 0, "id": "call_", "function": {"name": "f"}}]})).as_bytes());
        acc.feed(frame(json!({"tool_calls": [{"index": 0, "id": "1", "function": {"name": "ignored", "arguments": "{}"}}]})).as_bytes());

        let message = acc.finish().message;
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.name, "f");
        assert_eq!(calls[0].function.arguments, "{}");
        assert!(message.extra.is_empty());
    }

    #[test]
    fn test_non_object_tool_call_deltas_are_ignored() {
        let mut acc = StreamAccumulator::new();
        acc.feed(frame(json!({"role": "assistant", "content": "x", "tool_calls": [null, 3]})).as_bytes());

        let message = acc.finish().message;
        assert!(message.tool_calls.is_none());
        assert_eq!(message.content_text(), "x");
    }

    #[test]
    fn test_repeated_role_is_kept_once() {
        let mut acc = StreamAccumulator::new();
        acc.feed(frame(json!({"role": "assistant", "content": "a"})).as_bytes());
        acc.feed(frame(json!({"role": "assistant", "content": "b"})).as_bytes());

        let message = acc.finish().message;
        assert_eq!(message.role.as_deref(), Some("assistant"));
        assert_eq!(message.content_text(), "ab");
    }
}
