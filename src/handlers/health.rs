//! Health check and cache management handlers
//!
//! Provides service status and reasoning cache endpoints

use crate::handlers::AppState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Version information
    pub version: String,
    /// Timestamp
    pub timestamp: String,
    pub details: HealthDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    /// Configured provider names
    pub providers: Vec<String>,
    /// Entries currently held by the reasoning cache, expired ones included
    pub cache_entries: usize,
    pub cache_ttl_seconds: i64,
}

/// Response of a cache clear
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

/// Basic health check
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    debug!("Executing health check");

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        details: HealthDetails {
            providers: state.config.provider_names(),
            cache_entries: state.cache.len(),
            cache_ttl_seconds: state.cache.ttl().num_seconds(),
        },
    })
}

/// Drop every remembered message
///
/// DELETE /cache
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let cleared = state.cache.len();
    state.cache.clear();
    info!("Reasoning cache cleared ({} entries)", cleared);
    Json(ClearCacheResponse { cleared })
}
