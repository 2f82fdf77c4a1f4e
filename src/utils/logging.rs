//! Logging utilities
//!
//! Subscriber setup and compact message summaries for debug logs

use crate::config::settings::LoggingConfig;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Maximum content characters kept in a message summary
const SUMMARY_CONTENT_CHARS: usize = 80;

/// Initialize the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level)?;

    let result = if config.format == "json" {
        // JSON format logs (production environment)
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .try_init()
    } else {
        // Human readable format (development environment)
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Truncate a string on a character boundary with a note about the original length
fn truncate_content(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total > max_chars {
        let kept: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars truncated)", kept, total - max_chars)
    } else {
        s.to_string()
    }
}

/// Summarize a chat message for logging: role, truncated content and extra field names
pub fn summarize_message(message: &Value) -> Value {
    let content = match message.get("content") {
        Some(Value::String(text)) => Value::String(truncate_content(text, SUMMARY_CONTENT_CHARS)),
        Some(Value::Array(parts)) => Value::String(format!("[...{} content parts]", parts.len())),
        _ => Value::Null,
    };

    let extra: Vec<&str> = message
        .as_object()
        .map(|object| {
            object
                .keys()
                .map(String::as_str)
                .filter(|name| !crate::models::STRUCTURAL_FIELDS.contains(name))
                .collect()
        })
        .unwrap_or_default();

    let mut summary = serde_json::json!({
        "role": message.get("role").cloned().unwrap_or(Value::Null),
        "content": content,
    });
    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        summary["tool_calls"] = serde_json::json!(format!("[...{} tool calls]", tool_calls.len()));
    }
    if !extra.is_empty() {
        summary["extra"] = serde_json::json!(extra);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_content_is_char_safe() {
        assert_eq!(truncate_content("héllo", 10), "héllo");
        assert_eq!(truncate_content("héllo", 2), "hé... (3 chars truncated)");
    }

    #[test]
    fn test_summarize_message() {
        let summary = summarize_message(&json!({
            "role": "assistant",
            "content": "x".repeat(100),
            "tool_calls": [{"id": "a"}],
            "reasoning": "long thoughts"
        }));

        assert_eq!(summary["role"], "assistant");
        assert!(summary["content"].as_str().unwrap().ends_with("(20 chars truncated)"));
        assert_eq!(summary["tool_calls"], "[...1 tool calls]");
        assert_eq!(summary["extra"], json!(["reasoning"]));
    }
}
