//! Web Processing Service for data-cube timeseries drills.
//!
//! Serves the process catalogue and runs drill executions through
//! [`drill_core::DrillPipeline`].

pub mod config;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::state::AppState;

/// Build the service router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::processes::list_processes_handler).head(handlers::processes::head_handler),
        )
        .route(
            "/processes/:identifier",
            get(handlers::processes::describe_process_handler),
        )
        .route(
            "/processes/:identifier/execution",
            post(handlers::processes::execute_handler),
        )
        .route("/ping", get(handlers::health::ping_handler))
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        .layer(Extension(state))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("max-age=0"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
