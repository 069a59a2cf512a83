//! HTTP front end for Qualigate.
//!
//! Exposes the health, rule-example and validation endpoints over axum and
//! maps core errors onto HTTP statuses. All engine work is delegated to a
//! shared [`ScanExecutor`], so request handlers never block.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use qualigate_core::ScanExecutor;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{Cli, GlobalArgs, LogFormatArg};
pub use error::ApiError;
pub use response::ValidationResponse;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide executor
    pub executor: Arc<ScanExecutor>,
}

impl AppState {
    /// Wraps a shared executor.
    pub const fn new(executor: Arc<ScanExecutor>) -> Self {
        Self { executor }
    }
}

/// Builds the service router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .route(
            "/validation-rules-examples",
            get(handlers::validation_rules_examples),
        )
        .route("/validate", post(handlers::validate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
