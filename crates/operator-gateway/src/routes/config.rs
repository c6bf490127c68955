//! Config override, rollback, and preset routes.
//!
//! Config operations through this surface audit on success, exactly like
//! intent executions; rejected operations leave no audit trace.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::ApiError;
use crate::service::AppState;

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub key: String,
    pub value: Value,
    pub reason: String,
    pub operator_id: String,
}

/// POST `/operator/config/override`.
pub async fn create_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state
        .config
        .create_override(&request.key, request.value, &request.operator_id, &request.reason)
        .await?;

    if let Err(e) = state
        .audit
        .append(
            "config_override",
            &request.operator_id,
            "override",
            json!({"key": receipt.key, "receipt_id": receipt.id, "newValue": receipt.new_value}),
        )
        .await
    {
        warn!(key = %receipt.key, error = %e, "Audit append failed for override");
    }

    Ok(Json(json!({"status": "APPLIED", "receipt": receipt})))
}

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub key: String,
    pub operator_id: String,
}

/// POST `/operator/config/rollback`.
pub async fn rollback(
    State(state): State<AppState>,
    Json(request): Json<RollbackRequest>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state
        .config
        .rollback(&request.key, &request.operator_id)
        .await?;

    if let Err(e) = state
        .audit
        .append(
            "config_rollback",
            &request.operator_id,
            "rollback",
            json!({"key": receipt.key, "receipt_id": receipt.id, "reverses": receipt.reverses}),
        )
        .await
    {
        warn!(key = %receipt.key, error = %e, "Audit append failed for rollback");
    }

    Ok(Json(json!({"status": "ROLLED_BACK", "receipt": receipt})))
}

#[derive(Debug, Deserialize)]
pub struct PresetRequest {
    pub name: String,
    pub operator_id: String,
}

/// POST `/operator/config/preset`.
pub async fn apply_preset(
    State(state): State<AppState>,
    Json(request): Json<PresetRequest>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .config
        .apply_preset(&request.name, &request.operator_id)
        .await?;

    if let Err(e) = state
        .audit
        .append(
            "config_preset",
            &request.operator_id,
            &format!("preset:{}", outcome.preset),
            json!({"outcomes": outcome.outcomes}),
        )
        .await
    {
        warn!(preset = %outcome.preset, error = %e, "Audit append failed for preset");
    }

    Ok(Json(serde_json::to_value(&outcome).map_err(|e| {
        ApiError::internal(format!("outcome serialization: {e}"))
    })?))
}
