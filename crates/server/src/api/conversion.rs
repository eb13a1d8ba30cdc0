//! Conversion run control and log handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use encodeq_core::{EngineState, RunSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ConversionStatusResponse {
    pub state: EngineState,
    pub queue_len: usize,
    pub log_len: usize,
    /// Most recent finished run, if any
    pub last_run: Option<RunSummary>,
}

#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    /// False when no run was in progress
    pub requested: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub from: usize,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub from: usize,
    pub lines: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ConversionStatusResponse> {
    let engine = state.engine();
    Json(ConversionStatusResponse {
        state: engine.state(),
        queue_len: engine.jobs().await.len(),
        log_len: engine.log_len().await,
        last_run: engine.last_run().await,
    })
}

/// Start draining the queue.
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ConversionStatusResponse>), ApiError> {
    state.engine().start().await?;
    let Json(status) = get_status(State(state)).await;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Ask the active job to stop. The run ends once it settles.
pub async fn terminate(State(state): State<Arc<AppState>>) -> (StatusCode, Json<TerminateResponse>) {
    let requested = state.engine().terminate().await;
    (StatusCode::ACCEPTED, Json(TerminateResponse { requested }))
}

/// Log lines of the current (or last) run, starting at `from`.
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Json<LogResponse> {
    Json(LogResponse {
        from: query.from,
        lines: state.engine().log_lines_from(query.from).await,
    })
}
