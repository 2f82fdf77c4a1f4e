//! Reasoning Relay Server
//!
//! Local chat-completions relay that keeps provider reasoning fields alive
//! across conversation turns

use anyhow::{Context, Result};
use reasoning_relay::utils::logging::init_logging;
use reasoning_relay::{create_router, version_info, AppConfig, AppState, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load settings first, they carry the logging configuration
    let settings = Settings::new().context("Failed to load server settings")?;
    init_logging(&settings.logging)?;
    info!("{} starting", version_info());

    let app_config = AppConfig::load_default().context("Failed to load provider configuration")?;
    info!("📁 Provider configuration loaded");

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let providers = app_config.provider_names();

    let state = AppState::new(app_config, settings)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Reasoning relay started!");
    info!("📝 Health check: http://{}/health", addr);
    for provider in providers {
        info!("🔄 Relay endpoint: http://{}/{}/chat/completions", addr, provider);
    }

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start server: {}", e))?;

    Ok(())
}
