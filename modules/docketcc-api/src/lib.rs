//! Admin and monitoring HTTP surface for the DocketCC pipeline.

pub mod auth;
pub mod error;
pub mod rest;
pub mod ticker;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use docketcc_pipeline::Pipeline;
use tokio::sync::Mutex;

pub struct AppState {
    pub pipeline: Pipeline,
    /// Bearer token for `/api/admin/*`. When unset, every admin request is refused.
    pub admin_token: Option<String>,
    /// Held for the duration of any poll so ticks and manual triggers never overlap.
    pub run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, admin_token: Option<String>) -> Self {
        Self {
            pipeline,
            admin_token,
            run_lock: Mutex::new(()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(rest::health))
        .route("/api/admin/dockets", get(rest::api_dockets))
        .route("/api/admin/dockets/{docket}/status", put(rest::api_set_docket_status))
        .route("/api/admin/filings/stats", get(rest::api_filing_stats))
        .route("/api/admin/filings/{docket}", get(rest::api_docket_filings))
        .route("/api/admin/queue", get(rest::api_queue))
        .route("/api/admin/logs", get(rest::api_logs))
        .route("/api/admin/trigger", post(rest::api_trigger))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
