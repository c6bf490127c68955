//! Executor and verifier seams.

pub mod standard;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use shared_types::{IntentReceipt, IntentRecord};

/// Executor failure. Whatever goes wrong inside an executor surfaces as
/// this; it never escapes the executor boundary as anything else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Executor failed: {0}")]
pub struct ExecutorError(pub String);

impl ExecutorError {
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

/// Applies one intent kind's effect to the platform.
#[async_trait]
pub trait IntentExecutor: Send + Sync {
    async fn execute(&self, intent: &IntentRecord) -> Result<IntentReceipt, ExecutorError>;
}

/// Post-execution verification result.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub verified: bool,
    /// Externally sourced proof fragments.
    pub evidence: Vec<Value>,
}

/// Confirms an intent's declared effect against observable state.
#[async_trait]
pub trait IntentVerifier: Send + Sync {
    async fn verify(&self, intent: &IntentRecord, receipt: &IntentReceipt) -> VerifyOutcome;
}
