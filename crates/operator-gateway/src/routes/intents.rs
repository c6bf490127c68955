//! Intent submission and listing.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use intent_store::IntentFilter;
use shared_types::{IntentKind, IntentStatus};

use crate::errors::ApiError;
use crate::service::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub preview: bool,
}

/// POST `/operator/intents`.
pub async fn submit_intent(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if query.preview {
        let reasons = state.intents.preview(&payload).await?;
        return Ok(Json(json!({
            "status": "PREVIEW",
            "reasons": reasons,
        })));
    }

    let response = state.intents.submit(&payload).await?;
    Ok(Json(serde_json::to_value(&response).map_err(|e| {
        ApiError::internal(format!("response serialization: {e}"))
    })?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
}

/// GET `/operator/intents`.
pub async fn list_intents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let kind = match &query.kind {
        None => None,
        Some(raw) => Some(
            serde_json::from_value::<IntentKind>(json!(raw))
                .map_err(|_| ApiError::bad_request(format!("unknown type {raw}")))?,
        ),
    };
    let status = match &query.status {
        None => None,
        Some(raw) => Some(
            serde_json::from_value::<IntentStatus>(json!(raw))
                .map_err(|_| ApiError::bad_request(format!("unknown status {raw}")))?,
        ),
    };

    let filter = IntentFilter {
        kind,
        status,
        operator_id: None,
        limit: query.limit.unwrap_or(50),
    };
    let result = state.intents.list(&filter);
    Ok(Json(json!({
        "intents": result.intents,
        "total": result.total,
    })))
}
