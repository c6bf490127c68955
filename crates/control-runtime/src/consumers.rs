//! Bus consumers owned by the runtime.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use audit_ledger::{AuditLog, FillJournal};
use shared_bus::{
    subjects, Ack, BreakerTripEvent, BusHandler, BusMessage, FillEvent, HandlerError,
    InMemoryEventBus,
};
use state_manager::StateManager;

/// Durable consumer applying execution fills to the journal and the
/// world state. Shadow fills are journaled for evidence but never touch
/// positions.
pub struct FillsConsumer {
    pub fills: Arc<FillJournal>,
    pub state: Arc<StateManager>,
}

#[async_trait]
impl BusHandler for FillsConsumer {
    async fn handle(&self, msg: &BusMessage) -> Result<Ack, HandlerError> {
        let event: FillEvent = msg
            .decode()
            .map_err(|e| HandlerError::Decode(e.to_string()))?;

        let record = self
            .fills
            .append(&event)
            .map_err(|e| HandlerError::Retry(e.to_string()))?;
        if !record.shadow {
            self.state.apply_fill(&record);
        }
        debug!(
            seq = record.seq,
            venue = %record.venue,
            symbol = %record.symbol,
            shadow = record.shadow,
            "Fill applied"
        );
        Ok(Ack::Ack)
    }
}

/// Ephemeral task feeding advisory analyst confidence into the world
/// state. Advisory only: it never gates intents, so delivery is
/// best-effort ephemeral rather than durable.
pub fn spawn_confidence_feed(bus: &Arc<InMemoryEventBus>, state: Arc<StateManager>) {
    let mut sub = bus.subscribe("evt.analyst.confidence.v1");
    tokio::spawn(async move {
        while let Some(msg) = sub.recv().await {
            match msg.payload.get("confidence").and_then(serde_json::Value::as_f64) {
                Some(confidence) => {
                    state.set_truth_confidence(confidence);
                }
                None => {
                    warn!(subject = %msg.subject, "Confidence event without numeric confidence");
                }
            }
        }
        debug!("Confidence feed stopped");
    });
}

/// Ephemeral task auditing breaker trips and resets. The trip itself
/// already mutated the world synchronously; this consumer records it in
/// the ledger with the post-trip state for replay.
pub fn spawn_breaker_audit(
    bus: &Arc<InMemoryEventBus>,
    audit: Arc<AuditLog>,
    state: Arc<StateManager>,
) {
    let mut sub = bus.subscribe(subjects::BREAKER_TRIP);
    tokio::spawn(async move {
        while let Some(msg) = sub.recv().await {
            let event: BreakerTripEvent = match msg.decode() {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Undecodable breaker event, skipping audit");
                    continue;
                }
            };
            let action = if event.tripped {
                format!("trip:{}", event.layer)
            } else {
                format!("reset:{}", event.layer)
            };
            let details = json!({
                "layer": event.layer,
                "reason": event.reason,
                "risk_state": event.risk_state,
                "state_after": state.snapshot(),
            });
            if let Err(e) = audit
                .append("breaker", &event.layer.to_string(), &action, details)
                .await
            {
                warn!(error = %e, "Breaker audit append failed");
            }
        }
        debug!("Breaker audit consumer stopped");
    });
}
