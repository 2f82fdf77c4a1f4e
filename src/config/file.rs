//! File-based configuration loading
//!
//! Loads server, provider and participating endpoint configuration from a JSON file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Endpoints known to return reasoning fields they refuse to accept back
pub const DEFAULT_REASONING_ENDPOINTS: [&str; 5] = [
    "https://openrouter.ai/api/v1/chat/completions",
    "https://api.minimax.chat/v1/text/chatcompletion",
    "https://llm.chutes.ai/v1/chat/completions",
    "https://nano-gpt.com/api/v1/chat/completions",
    "https://nano-gpt.com/api/v1legacy/chat/completions",
];

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (default: "127.0.0.1" - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 8082)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_reasoning_endpoints() -> Vec<String> {
    DEFAULT_REASONING_ENDPOINTS
        .iter()
        .map(|endpoint| endpoint.to_string())
        .collect()
}

/// Application configuration loaded from JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (optional, defaults to localhost:8082)
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream providers by name; the name is the first path segment of relay URLs
    pub providers: HashMap<String, ProviderConfig>,

    /// Target URLs whose exchanges get reasoning preservation
    #[serde(rename = "reasoningEndpoints", default = "default_reasoning_endpoints")]
    pub reasoning_endpoints: Vec<String>,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API, `/chat/completions` is appended
    #[serde(rename = "baseUrl")]
    pub base_url: String,

    /// API key replacing the client's Authorization header (empty keeps the client's)
    #[serde(rename = "apiKey", default)]
    pub api_key: String,

    /// Custom headers to add to requests
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl ProviderConfig {
    /// Full chat completions URL
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: AppConfig =
            serde_json::from_str(&content).with_context(|| "Failed to parse config JSON")?;

        config.validate()?;

        debug!(
            "Loaded {} providers, {} reasoning endpoints",
            config.providers.len(),
            config.reasoning_endpoints.len()
        );
        Ok(config)
    }

    /// Load configuration from default locations
    /// Searches in order:
    /// 1. ~/.config/reasoning-relay/reasoning-relay.json
    /// 2. ./reasoning-relay.json
    ///
    /// Returns error if no configuration file is found.
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home
                .join(".config")
                .join("reasoning-relay")
                .join("reasoning-relay.json");
            if config_path.exists() {
                return Self::load(&config_path);
            }
        }

        let local_path = Path::new("reasoning-relay.json");
        if local_path.exists() {
            return Self::load(local_path);
        }

        anyhow::bail!(
            "Configuration file not found. Please create one at:\n\
             - ~/.config/reasoning-relay/reasoning-relay.json (recommended)\n\
             - ./reasoning-relay.json (current directory)"
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("At least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            if name.is_empty() || name.contains('/') {
                anyhow::bail!("Invalid provider name '{}'", name);
            }

            if !provider.base_url.starts_with("http") {
                anyhow::bail!("Invalid base URL for provider '{}': {}", name, provider.base_url);
            }
        }

        if self.reasoning_endpoints.iter().any(String::is_empty) {
            anyhow::bail!("Reasoning endpoints cannot be empty strings");
        }

        Ok(())
    }

    /// Get a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Whether exchanges with this URL get reasoning preservation
    pub fn participates(&self, url: &str) -> bool {
        self.reasoning_endpoints
            .iter()
            .any(|endpoint| url.contains(endpoint.as_str()))
    }

    /// Sorted provider names
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> String {
        r#"{
            "providers": {
                "openrouter": {
                    "baseUrl": "https://openrouter.ai/api/v1/",
                    "apiKey": "sk-or-test"
                },
                "local": {
                    "baseUrl": "http://localhost:11434/v1"
                }
            }
        }"#
        .to_string()
    }

    fn load(config_str: &str) -> Result<AppConfig> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config_str.as_bytes()).unwrap();
        AppConfig::load(file.path())
    }

    #[test]
    fn test_load_config_with_defaults() {
        let config = load(&create_test_config()).unwrap();

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.server.port, 8082);
        assert_eq!(config.reasoning_endpoints.len(), DEFAULT_REASONING_ENDPOINTS.len());
        assert_eq!(config.provider_names(), vec!["local", "openrouter"]);
    }

    #[test]
    fn test_chat_completions_url() {
        let config = load(&create_test_config()).unwrap();
        let provider = config.provider("openrouter").unwrap();
        assert_eq!(
            provider.chat_completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_participates() {
        let config = load(&create_test_config()).unwrap();

        assert!(config.participates(&config.provider("openrouter").unwrap().chat_completions_url()));
        assert!(!config.participates(&config.provider("local").unwrap().chat_completions_url()));
    }

    #[test]
    fn test_validation_empty_providers() {
        assert!(load(r#"{"providers": {}}"#).is_err());
    }

    #[test]
    fn test_validation_invalid_base_url() {
        assert!(load(r#"{"providers": {"p": {"baseUrl": "ftp://example.com"}}}"#).is_err());
    }
}
