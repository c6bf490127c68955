//! Unified state and historical reconstruction.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ApiError;
use crate::service::AppState;

/// GET `/operator/state`.
pub async fn operator_state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let view = state.projection.view();
    serde_json::to_value(view.as_ref())
        .map(Json)
        .map_err(|e| ApiError::internal(format!("view serialization: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub timestamp: String,
}

/// GET `/operator/history/state?timestamp=<RFC3339>`.
pub async fn historical_state(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let timestamp: DateTime<Utc> = query
        .timestamp
        .parse()
        .map_err(|_| ApiError::bad_request(format!("timestamp {:?} is not RFC3339", query.timestamp)))?;

    let view = state
        .replay
        .reconstruct_state_at(timestamp)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    serde_json::to_value(&view)
        .map(Json)
        .map_err(|e| ApiError::internal(format!("view serialization: {e}")))
}
