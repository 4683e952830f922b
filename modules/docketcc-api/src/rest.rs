use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use docketcc_common::{validate_docket_number, DocketHealth, DocketStatus, LogLevel};
use docketcc_pipeline::RunReport;
use docketcc_store::{DocketEntry, FilingStats, QueueEntry, QueueStats, StoredFiling, StoredLogEntry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

// --- Query / body structs ---

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    limit: Option<i64>,
    level: Option<LogLevel>,
}

#[derive(Deserialize)]
pub struct TriggerRequest {
    docket_number: String,
    lookback_hours: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: DocketStatus,
}

// --- Response structs ---

#[derive(Serialize)]
pub struct DocketView {
    #[serde(flatten)]
    entry: DocketEntry,
    health: DocketHealth,
}

#[derive(Serialize)]
pub struct QueueView {
    stats: QueueStats,
    recent: Vec<QueueEntry>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// --- Handlers ---

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "docketcc" }))
}

pub async fn api_dockets(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DocketView>>, ApiError> {
    let now = Utc::now();
    let dockets = state
        .pipeline
        .registry()
        .list_all()
        .await?
        .into_iter()
        .map(|entry| DocketView {
            health: entry.health(now),
            entry,
        })
        .collect();
    Ok(Json(dockets))
}

pub async fn api_set_docket_status(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(docket): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let docket = validate_docket_number(&docket)?;
    if !state.pipeline.registry().set_status(&docket, body.status).await? {
        return Err(ApiError::NotFound(format!("docket {docket}")));
    }
    info!(docket = %docket, status = %body.status, "Docket status changed");
    Ok(Json(json!({ "docket_number": docket, "status": body.status })))
}

pub async fn api_filing_stats(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilingStats>, ApiError> {
    Ok(Json(state.pipeline.filings().get_stats().await?))
}

pub async fn api_docket_filings(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Path(docket): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<StoredFiling>>, ApiError> {
    let docket = validate_docket_number(&docket)?;
    let filings = state
        .pipeline
        .filings()
        .get_recent(&docket, clamp_limit(params.limit))
        .await?;
    Ok(Json(filings))
}

pub async fn api_queue(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<QueueView>, ApiError> {
    let queue = state.pipeline.queue();
    Ok(Json(QueueView {
        stats: queue.stats().await?,
        recent: queue.list_recent(clamp_limit(params.limit)).await?,
    }))
}

pub async fn api_logs(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<Vec<StoredLogEntry>>, ApiError> {
    let logs = state
        .pipeline
        .system_log()
        .recent(clamp_limit(params.limit), params.level)
        .await?;
    Ok(Json(logs))
}

/// Out-of-band poll of one docket. Refused with 409 while another poll runs.
pub async fn api_trigger(
    _auth: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(body): Json<TriggerRequest>,
) -> Result<Json<RunReport>, ApiError> {
    let docket = validate_docket_number(&body.docket_number)?;
    let lookback_hours = body
        .lookback_hours
        .unwrap_or(DEFAULT_LOOKBACK_HOURS)
        .clamp(1, 24 * 30);

    let Ok(_guard) = state.run_lock.try_lock() else {
        return Err(ApiError::Busy);
    };

    info!(docket = %docket, lookback_hours, "Admin trigger");
    let report = state.pipeline.run_docket(&docket, lookback_hours).await?;
    Ok(Json(report))
}
