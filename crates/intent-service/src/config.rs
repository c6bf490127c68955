//! Intent service tuning and authorization tables.

use std::collections::HashMap;

use shared_types::{RbacTable, Role};

/// Recognized submission options.
#[derive(Debug, Clone)]
pub struct IntentServiceConfig {
    /// Backpressure bound: submissions beyond this return `QUEUE_SATURATED`.
    pub max_in_memory: usize,

    /// One-shot TTL extension while a verifier is in flight.
    pub ttl_grace_ms: u64,

    /// SSE catch-up ring size.
    pub sse_retention: usize,

    /// Verification attempts before settling for `unverified`.
    pub verify_retries: u32,

    /// Pause between verification attempts.
    pub verify_backoff_ms: u64,

    /// Operator roster: id → role. Unknown operators default to viewer.
    pub operators: HashMap<String, Role>,

    /// The `{role, kind}` allow table. Superadmin bypasses it.
    pub rbac: RbacTable,
}

impl Default for IntentServiceConfig {
    fn default() -> Self {
        Self {
            max_in_memory: 10_000,
            ttl_grace_ms: 5_000,
            sse_retention: 2_048,
            verify_retries: 3,
            verify_backoff_ms: 50,
            operators: HashMap::new(),
            rbac: RbacTable::standard(),
        }
    }
}

impl IntentServiceConfig {
    /// Resolve an operator's role. Unknown operators are viewers: they can
    /// read everything and change nothing.
    #[must_use]
    pub fn role_of(&self, operator_id: &str) -> Role {
        self.operators
            .get(operator_id)
            .copied()
            .unwrap_or(Role::Viewer)
    }
}
