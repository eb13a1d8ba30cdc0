//! Queue API handlers.

use axum::{extract::State, http::StatusCode, Json};
use encodeq_core::QueueSnapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

/// Request body for adding files to the queue.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    /// Jobs actually added (duplicates are skipped)
    pub added: usize,
    /// Queue length after the call
    pub total: usize,
}

/// List the queue with per-job progress and status.
pub async fn list_queue(State(state): State<Arc<AppState>>) -> Json<QueueSnapshot> {
    Json(state.engine().snapshot().await)
}

/// Append files to the queue.
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("paths must not be empty".to_string()));
    }

    let engine = state.engine();
    let added = engine.enqueue(&request.paths).await?;
    let total = engine.jobs().await.len();

    let status = if added > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(EnqueueResponse { added, total })))
}

/// Remove every job and the run log.
pub async fn clear_queue(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.engine().clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
