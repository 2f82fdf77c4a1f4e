//! Data models module
//!
//! Defines the chat message structures and the relay's error body

use serde::{Deserialize, Serialize};

pub mod message;

pub use message::{FunctionCall, Message, ToolCall, NON_REPLAYABLE_FIELDS, STRUCTURAL_FIELDS};

/// OpenAI-style error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
}
