//! Shared test fixture: a fully wired ephemeral control plane.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use control_runtime::{wiring, Runtime, RuntimeConfig};
use shared_crypto::{intent_signature, OpsSecret};
use shared_types::Role;

/// The operator shared secret every harness runtime uses.
pub const OPS_SECRET: &[u8] = b"synapse-test-ops-secret";

/// Build an ephemeral runtime with an admin, an operator, and a viewer.
#[must_use]
pub fn runtime() -> Runtime {
    let config = RuntimeConfig {
        data_dir: std::env::temp_dir().join("synapse-tests-unused"),
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        ops_secret: String::from_utf8_lossy(OPS_SECRET).to_string(),
        venue_account: "main".to_string(),
        operators: HashMap::from([
            ("op-admin".to_string(), Role::Admin),
            ("op-desk".to_string(), Role::Operator),
            ("op-view".to_string(), Role::Viewer),
        ]),
        snapshot_interval_secs: 3_600,
        ephemeral: true,
        config_env_layer: HashMap::new(),
    };
    wiring::build(&config).expect("ephemeral runtime builds")
}

/// A correctly signed submission payload.
#[must_use]
pub fn signed_intent(kind: &str, params: Value, operator: &str, idem: &str) -> Value {
    let id = uuid::Uuid::new_v4().to_string();
    let signature = intent_signature(
        &OpsSecret::new(OPS_SECRET.to_vec()),
        &id,
        kind,
        &params,
        operator,
    )
    .expect("signable params");
    serde_json::json!({
        "id": id,
        "idempotency_key": idem,
        "version": 1,
        "type": kind,
        "params": params,
        "operator_id": operator,
        "reason": "integration test",
        "submitted_at": Utc::now().to_rfc3339(),
        "ttl_seconds": 30,
        "signature": signature,
    })
}

/// Let spawned executors and consumers drain.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(120)).await;
}
