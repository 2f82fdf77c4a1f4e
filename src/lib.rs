//! Reasoning Relay Library
//!
//! Preserves provider-specific message fields (reasoning text, metadata) across
//! chat-completion turns: they are remembered from responses and put back into
//! the conversation history of later requests

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::{AppConfig, Settings};
pub use handlers::{create_router, AppState};
pub use models::Message;
pub use services::{ReasoningCache, ReasoningStream, StreamAccumulator};
pub use utils::error::{AppError, AppResult};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
