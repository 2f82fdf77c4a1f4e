//! HTTP handlers module
//!
//! Contains all HTTP endpoint handling logic

pub mod health;
pub mod proxy;

use crate::config::{AppConfig, Settings};
use crate::middleware::logging::request_logging_middleware;
use crate::services::{HttpUpstream, ReasoningCache, Upstream};
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub settings: Settings,
    pub cache: Arc<ReasoningCache>,
    pub upstream: Arc<dyn Upstream>,
}

impl AppState {
    /// Build state with the reqwest upstream
    pub fn new(config: AppConfig, settings: Settings) -> Result<Self> {
        let upstream = HttpUpstream::with_timeouts(
            settings.request.timeout,
            settings.request.stream_timeout,
        )?;
        Ok(Self::with_upstream(config, settings, Arc::new(upstream)))
    }

    /// Build state around any upstream implementation
    pub fn with_upstream(
        config: AppConfig,
        settings: Settings,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        let cache = Arc::new(ReasoningCache::new(settings.cache_ttl()));
        Self {
            config,
            settings,
            cache,
            upstream,
        }
    }
}

/// Create application router
pub fn create_router(state: AppState) -> Router {
    let max_request_size = state.settings.request.max_request_size;
    let app_state = Arc::new(state);

    // Create middleware stack
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn(request_logging_middleware));

    Router::new()
        .route("/:provider/chat/completions", post(proxy::handle_chat_completions))
        .route("/:provider/v1/chat/completions", post(proxy::handle_chat_completions))
        .route("/health", get(health::health_check))
        .route("/cache", delete(health::clear_cache))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(middleware_stack)
}
