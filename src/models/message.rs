//! Chat message data models
//!
//! Defines the assistant message shape shared by the stream accumulator,
//! the reasoning cache and the request rewriter

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fields that make up the standard message shape; everything else is "extra"
pub const STRUCTURAL_FIELDS: [&str; 3] = ["role", "content", "tool_calls"];

/// Extra fields that identify calls and must never be replayed into a new request
pub const NON_REPLAYABLE_FIELDS: [&str; 2] = ["tool_calls", "tool_call_id"];

/// One logical chat turn, either accumulated from a stream or parsed whole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role (assistant/user/system/tool)
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Message content, usually text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Tool calls (optional)
    #[serde(
        default,
        deserialize_with = "lenient_tool_calls",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Provider-defined fields outside the structural set
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One function invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Position among parallel calls of the same message
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Call id
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    /// Call type
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub call_type: String,
    /// Function being called
    #[serde(default, deserialize_with = "lenient")]
    pub function: FunctionCall,
}

/// Function name and JSON argument text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub arguments: String,
}

/// Deserialize a field, falling back to its default when the value has another shape
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Tool calls are kept element by element; an unusable element becomes an empty call.
/// Anything but an array means no tool calls.
fn lenient_tool_calls<'de, D>(deserializer: D) -> Result<Option<Vec<ToolCall>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        )),
        _ => Ok(None),
    }
}

impl Message {
    /// Build a message from an arbitrary JSON value.
    ///
    /// Returns `None` for non-objects. Structural fields with an unexpected
    /// shape fall back to their defaults instead of rejecting the message.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Build a message from an accumulated field map
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        let role = match fields.remove("role") {
            Some(Value::String(role)) => Some(role),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let content = match fields.remove("content") {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        };
        let tool_calls = fields
            .remove("tool_calls")
            .and_then(|value| serde_json::from_value(value).ok());

        Self {
            role,
            content,
            tool_calls,
            extra: fields,
        }
    }

    /// Whether the message carries anything worth remembering
    pub fn is_cacheable(&self) -> bool {
        !self.extra.is_empty()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.as_deref() == Some("assistant")
    }

    /// Content as key text: the string itself, empty when absent, JSON text otherwise
    pub fn content_text(&self) -> String {
        match &self.content {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Ids of the message's tool calls, in order
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|call| call.id.as_str())
            .collect()
    }

    /// Extra fields that may be merged into a later request
    pub fn replayable_extra(&self) -> Map<String, Value> {
        self.extra
            .iter()
            .filter(|(name, _)| !NON_REPLAYABLE_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
