//! Error-to-HTTP mapping.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use config_registry::ConfigError;
use shared_types::SubmitError;

/// Wrapper turning domain errors into wire responses.
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub reasons: Vec<serde_json::Value>,
    pub retry_after: Option<u64>,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_FAILED".to_string(),
            message: message.into(),
            reasons: Vec::new(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL".to_string(),
            message: message.into(),
            reasons: Vec::new(),
            retry_after: None,
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        let status = match &err {
            SubmitError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            SubmitError::SignatureInvalid | SubmitError::InsufficientPermissions { .. } => {
                StatusCode::FORBIDDEN
            }
            SubmitError::StateConflict { .. } => StatusCode::CONFLICT,
            SubmitError::BlockedByCap { .. } | SubmitError::BlockedByBreaker { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SubmitError::QueueSaturated { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SubmitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let retry_after = matches!(err, SubmitError::QueueSaturated { .. }).then_some(1);
        let reasons = err
            .reasons()
            .into_iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        Self {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
            reasons,
            retry_after,
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        let (status, code) = match &err {
            ConfigError::UnknownKey(_) | ConfigError::UnknownPreset(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_KEY")
            }
            ConfigError::SchemaViolation { .. } => (StatusCode::BAD_REQUEST, "SCHEMA_VIOLATION"),
            ConfigError::Immutable(_)
            | ConfigError::TightenOnly { .. }
            | ConfigError::RaiseOnly { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "SAFETY_VIOLATION"),
            ConfigError::NoActiveOverride(_) => (StatusCode::CONFLICT, "NO_ACTIVE_OVERRIDE"),
            ConfigError::ReceiptChain(_) | ConfigError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        };
        Self {
            status,
            code: code.to_string(),
            message: err.to_string(),
            reasons: Vec::new(),
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code,
            "message": self.message,
        });
        if !self.reasons.is_empty() {
            body["reasons"] = json!(self.reasons);
        }
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
