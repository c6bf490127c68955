//! The submission pipeline and intent state machine.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use audit_ledger::AuditLog;
use circuit_breakers::BreakerTree;
use config_registry::ConfigRegistry;
use intent_store::{IntentFilter, IntentRepository};
use shared_crypto::{verify_intent_signature, OpsSecret};
use shared_types::{
    IntentKind, IntentReceipt, IntentRecord, IntentStatus, PreviewReason, SubmitError,
    SubmitOutcome, Verification,
};
use state_manager::StateManager;

use crate::config::IntentServiceConfig;
use crate::events::{EventHub, IntentEventKind};
use crate::registry::{IntentRegistry, IntentSpec};
use crate::validate::parse_submission;

/// Successful submission response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    #[serde(rename = "status")]
    pub outcome: SubmitOutcome,
    pub intent: IntentRecord,
}

/// List query result.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub intents: Vec<IntentRecord>,
    pub total: usize,
}

/// The intent service. One instance owns all intent state transitions.
pub struct IntentService {
    config: IntentServiceConfig,
    secret: OpsSecret,
    registry: IntentRegistry,
    records: RwLock<HashMap<String, IntentRecord>>,
    /// idempotency_key → id
    idem: RwLock<HashMap<String, String>>,
    /// idempotency_key → record as of acceptance, so idempotent replays
    /// return the original acceptance body.
    acceptance: RwLock<HashMap<String, IntentRecord>>,
    in_flight: DashMap<String, ()>,
    hub: EventHub,
    store: Arc<dyn IntentRepository>,
    audit: Arc<AuditLog>,
    state: Arc<StateManager>,
    breakers: Arc<BreakerTree>,
    config_registry: Arc<ConfigRegistry>,
    /// Self-handle for spawning executor and TTL tasks.
    weak: Weak<IntentService>,
}

impl IntentService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: IntentServiceConfig,
        secret: OpsSecret,
        registry: IntentRegistry,
        store: Arc<dyn IntentRepository>,
        audit: Arc<AuditLog>,
        state: Arc<StateManager>,
        breakers: Arc<BreakerTree>,
        config_registry: Arc<ConfigRegistry>,
    ) -> Arc<Self> {
        let hub = EventHub::new(config.sse_retention);
        Arc::new_cyclic(|weak| Self {
            config,
            secret,
            registry,
            records: RwLock::new(HashMap::new()),
            idem: RwLock::new(HashMap::new()),
            acceptance: RwLock::new(HashMap::new()),
            in_flight: DashMap::new(),
            hub,
            store,
            audit,
            state,
            breakers,
            config_registry,
            weak: weak.clone(),
        })
    }

    /// The SSE hub (catch-up ring + live feed).
    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Load recent records from the store. An in-memory record wins over a
    /// stored one unless the stored one is terminal and memory's is not.
    pub fn hydrate_from_store(&self) {
        let loaded = match self.store.find_recent(self.config.max_in_memory, None) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Hydration query failed, starting empty");
                return;
            }
        };
        let count = loaded.len();

        let mut records = self.records.write();
        let mut idem = self.idem.write();
        let mut acceptance = self.acceptance.write();
        for stored in loaded {
            let keep_stored = match records.get(&stored.id) {
                None => true,
                Some(mem) => stored.status.is_terminal() && !mem.status.is_terminal(),
            };
            if keep_stored {
                idem.insert(stored.idempotency_key.clone(), stored.id.clone());
                acceptance.insert(stored.idempotency_key.clone(), stored.clone());
                records.insert(stored.id.clone(), stored);
            }
        }
        info!(loaded = count, in_memory = records.len(), "Intent state hydrated");
    }

    /// Preview a submission: run the full gauntlet up to acceptance and
    /// report every reason, with no side effects.
    ///
    /// # Errors
    ///
    /// The same pre-acceptance rejections as [`submit`].
    ///
    /// [`submit`]: IntentService::submit
    pub async fn preview(&self, payload: &Value) -> Result<Vec<PreviewReason>, SubmitError> {
        let (parsed, spec) = self.run_gates(payload)?;
        Ok(self.build_preview(&parsed.kind, spec, parsed.operator_id.as_str()))
    }

    /// Submit an intent.
    ///
    /// # Errors
    ///
    /// See the error taxonomy in `shared_types::SubmitError`; every variant
    /// maps to a stable wire code.
    pub async fn submit(&self, payload: &Value) -> Result<SubmitResponse, SubmitError> {
        let (parsed, spec) = self.run_gates(payload)?;

        // Idempotency: a replayed key returns the original acceptance body.
        if let Some(original) = self.acceptance.read().get(&parsed.idempotency_key) {
            debug!(id = %original.id, key = %parsed.idempotency_key, "Idempotent hit");
            return Ok(SubmitResponse {
                outcome: SubmitOutcome::IdempotentHit,
                intent: original.clone(),
            });
        }

        // Optimistic concurrency against the world the operator saw.
        if let Some(submitted) = &parsed.state_hash {
            let current = self.state.current_hash();
            if submitted != &current {
                return Err(SubmitError::StateConflict {
                    submitted: submitted.clone(),
                    current,
                });
            }
        }

        // Backpressure.
        let in_memory = self.records.read().len();
        if in_memory >= self.config.max_in_memory {
            return Err(SubmitError::QueueSaturated {
                in_memory,
                max_in_memory: self.config.max_in_memory,
            });
        }

        // Blocking preview reasons reject the live submission.
        let reasons = self.build_preview(&parsed.kind, spec, parsed.operator_id.as_str());
        let blocking: Vec<PreviewReason> =
            reasons.iter().filter(|r| r.blocking).cloned().collect();
        if !blocking.is_empty() {
            if blocking.iter().any(|r| r.code == "cap_exceeded") {
                return Err(SubmitError::BlockedByCap { reasons: blocking });
            }
            return Err(SubmitError::BlockedByBreaker { reasons: blocking });
        }

        // Accept.
        let record = IntentRecord {
            id: parsed.id.clone(),
            idempotency_key: parsed.idempotency_key.clone(),
            version: parsed.version,
            kind: parsed.kind,
            params: parsed.params.clone(),
            operator_id: parsed.operator_id.clone(),
            reason: parsed.reason.clone(),
            submitted_at: parsed.submitted_at,
            ttl_seconds: parsed.ttl_seconds,
            state_hash: parsed.state_hash.clone(),
            signature: parsed.signature.clone(),
            status: IntentStatus::Accepted,
            danger_level: spec.danger_level,
            receipt: None,
        };

        {
            let mut records = self.records.write();
            let mut idem = self.idem.write();
            // Re-check under the write locks: a concurrent submission with
            // the same key may have accepted first.
            if let Some(existing_id) = idem.get(&record.idempotency_key) {
                let existing = records.get(existing_id).cloned();
                drop(idem);
                drop(records);
                if let Some(original) = self
                    .acceptance
                    .read()
                    .get(&record.idempotency_key)
                    .cloned()
                    .or(existing)
                {
                    return Ok(SubmitResponse {
                        outcome: SubmitOutcome::IdempotentHit,
                        intent: original,
                    });
                }
                return Err(SubmitError::Internal("idempotency index desync".into()));
            }
            if records.contains_key(&record.id) {
                return Err(SubmitError::ValidationFailed {
                    reasons: vec![format!("id {} already exists", record.id)],
                });
            }
            idem.insert(record.idempotency_key.clone(), record.id.clone());
            records.insert(record.id.clone(), record.clone());
        }
        self.acceptance
            .write()
            .insert(record.idempotency_key.clone(), record.clone());

        // Write-through persistence: failures degrade durability, never
        // availability.
        if let Err(e) = self.store.insert(&record) {
            warn!(id = %record.id, error = %e, "Write-through insert failed");
        }

        let event_id = self.hub.publish(IntentEventKind::Accepted, record.clone());
        info!(
            id = %record.id,
            kind = %record.kind,
            operator = %record.operator_id,
            event_id,
            "Intent accepted"
        );

        // TTL timer and executor run concurrently; the status DAG
        // arbitrates whoever finishes first.
        let Some(service) = self.weak.upgrade() else {
            return Err(SubmitError::Internal("service shutting down".to_string()));
        };
        let ttl_service = Arc::clone(&service);
        let ttl_id = record.id.clone();
        tokio::spawn(async move { ttl_service.ttl_watch(ttl_id).await });

        let exec_id = record.id.clone();
        tokio::spawn(async move { service.run_intent(exec_id).await });

        Ok(SubmitResponse {
            outcome: SubmitOutcome::Accepted,
            intent: record,
        })
    }

    /// Operator-initiated cancellation. Returns true when this call won
    /// the race to a terminal status.
    pub async fn cancel_intent(&self, id: &str, operator_id: &str) -> bool {
        let receipt = IntentReceipt::failed(format!("cancelled by {operator_id}"));
        match self.resolve_terminal(id, IntentStatus::Failed, receipt).await {
            Some(record) => {
                info!(id = %record.id, operator = operator_id, "Intent cancelled");
                true
            }
            None => false,
        }
    }

    /// Fetch one record.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<IntentRecord> {
        self.records.read().get(id).cloned()
    }

    /// List stored records with filters; `total` counts all stored records.
    #[must_use]
    pub fn list(&self, filter: &IntentFilter) -> ListResult {
        let intents = self.store.find_filtered(filter).unwrap_or_default();
        ListResult {
            intents,
            total: self.store.len(),
        }
    }

    /// Most recent records, for the read-model projection.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<IntentRecord> {
        self.store.find_recent(limit, None).unwrap_or_default()
    }

    /// Non-terminal record count (open work).
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    // =========================================================================
    // PIPELINE INTERNALS
    // =========================================================================

    /// Gates 1-3: schema, signature, RBAC. Shared by live and preview.
    fn run_gates(
        &self,
        payload: &Value,
    ) -> Result<(crate::validate::ParsedSubmission, &IntentSpec), SubmitError> {
        let parsed = parse_submission(payload, &self.registry)
            .map_err(|reasons| SubmitError::ValidationFailed { reasons })?;

        if !verify_intent_signature(
            &self.secret,
            &parsed.id,
            parsed.kind.as_str(),
            &parsed.params,
            &parsed.operator_id,
            &parsed.signature,
        ) {
            // Deliberately unaudited: no amplification of hostile traffic.
            debug!(id = %parsed.id, "Signature mismatch");
            return Err(SubmitError::SignatureInvalid);
        }

        let spec = self
            .registry
            .spec(parsed.kind)
            .ok_or_else(|| SubmitError::Internal(format!("no spec for {}", parsed.kind)))?;

        let role = self.config.role_of(&parsed.operator_id);
        if !self.config.rbac.allows(role, parsed.kind) {
            debug!(operator = %parsed.operator_id, role = role.as_str(), kind = %parsed.kind, "RBAC deny");
            return Err(SubmitError::InsufficientPermissions {
                permission: spec.required_permission.clone(),
            });
        }

        Ok((parsed, spec))
    }

    /// Build the preview reason list: potential blockers plus ok markers.
    fn build_preview(
        &self,
        kind: &IntentKind,
        spec: &IntentSpec,
        operator_id: &str,
    ) -> Vec<PreviewReason> {
        let mut reasons = Vec::new();
        let world = self.state.snapshot();
        let role = self.config.role_of(operator_id);

        reasons.push(PreviewReason {
            code: "rbac".to_string(),
            detail: format!("role {} allows {kind}", role.as_str()),
            blocking: false,
        });

        // Notional cap applies to actions that enable new exposure.
        if *kind == IntentKind::Arm {
            let gross: f64 = world
                .positions
                .iter()
                .map(|p| p.qty.abs() * p.avg_price)
                .sum();
            let cap = self
                .config_registry
                .effective_value("risk.maxPositionNotional")
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::INFINITY);
            if gross > cap {
                reasons.push(PreviewReason {
                    code: "cap_exceeded".to_string(),
                    detail: format!("gross notional {gross:.2} exceeds cap {cap:.2}"),
                    blocking: true,
                });
            } else {
                reasons.push(PreviewReason {
                    code: "cap".to_string(),
                    detail: format!("gross notional {gross:.2} within cap {cap:.2}"),
                    blocking: false,
                });
            }
        }

        // Breaker / posture gate.
        let blocked_by_safety = (world.halted || !self.breakers.can_trade())
            && !spec.allowed_in_emergency;
        if blocked_by_safety {
            reasons.push(PreviewReason {
                code: "breaker_open".to_string(),
                detail: format!(
                    "posture {} blocks {kind}; resume first",
                    world.posture.as_str()
                ),
                blocking: true,
            });
        } else if world.risk_state != shared_types::RiskState::Normal {
            reasons.push(PreviewReason {
                code: "posture".to_string(),
                detail: format!("risk state {} (degraded)", world.risk_state),
                blocking: false,
            });
        }

        // Conflicting open intent of the same kind.
        let conflict = self
            .records
            .read()
            .values()
            .any(|r| r.kind == *kind && !r.status.is_terminal());
        if conflict {
            reasons.push(PreviewReason {
                code: "conflict".to_string(),
                detail: format!("another {kind} intent is still open"),
                blocking: false,
            });
        }

        // Venue note for order-emitting kinds in live mode.
        if world.mode == shared_types::TradingMode::Live
            && matches!(kind, IntentKind::Arm | IntentKind::Flatten)
        {
            let venue = self
                .config_registry
                .effective_value("exec.primaryVenue")
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string());
            reasons.push(PreviewReason {
                code: "venue".to_string(),
                detail: format!("orders will route to {venue}"),
                blocking: false,
            });
        }

        reasons
    }

    /// Move a record to a non-terminal status. Returns the updated record,
    /// or `None` if the transition lost a race.
    fn advance(&self, id: &str, to: IntentStatus) -> Option<IntentRecord> {
        let mut records = self.records.write();
        let record = records.get_mut(id)?;
        if !record.status.can_transition_to(to) || to.is_terminal() {
            return None;
        }
        record.status = to;
        Some(record.clone())
    }

    /// Move a record to a terminal status with its receipt, write through,
    /// stream, and audit. First terminal writer wins; losers get `None`.
    async fn resolve_terminal(
        &self,
        id: &str,
        to: IntentStatus,
        receipt: IntentReceipt,
    ) -> Option<IntentRecord> {
        let record = {
            let mut records = self.records.write();
            let record = records.get_mut(id)?;
            if !to.is_terminal() || !record.status.can_transition_to(to) {
                return None;
            }
            record.status = to;
            record.receipt = Some(receipt.clone());
            record.clone()
        };

        if let Err(e) = self.store.resolve(id, to, receipt) {
            warn!(id, error = %e, "Write-through resolve failed");
        }

        let kind = match to {
            IntentStatus::Verified => IntentEventKind::Verified,
            IntentStatus::Failed => IntentEventKind::Failed,
            _ => IntentEventKind::Expired,
        };
        self.hub.publish(kind, record.clone());

        // One audit entry per intent, at terminal resolution. Verified
        // intents carry the post-execution world for replay.
        let mut details = json!({
            "intent_id": record.id,
            "status": record.status,
            "effect": record.receipt.as_ref().map(|r| r.effect.clone()),
            "params": record.params,
        });
        if to == IntentStatus::Verified {
            details["state_after"] = serde_json::to_value(self.state.snapshot()).unwrap_or_default();
        }
        if let Err(e) = self
            .audit
            .append("intent", &record.operator_id, record.kind.as_str(), details)
            .await
        {
            warn!(id, error = %e, "Audit append failed");
        }

        Some(record)
    }

    /// Executor task: single-flight per intent id.
    async fn run_intent(&self, id: String) {
        if self.in_flight.insert(id.clone(), ()).is_some() {
            debug!(id = %id, "Executor already in flight, skipping");
            return;
        }

        let result = self.run_intent_inner(&id).await;
        self.in_flight.remove(&id);
        if let Err(detail) = result {
            // Executor failures resolve the intent, never crash the task.
            let receipt = IntentReceipt::failed(detail.clone());
            if self
                .resolve_terminal(&id, IntentStatus::Failed, receipt)
                .await
                .is_some()
            {
                warn!(id = %id, error = %detail, "Intent failed");
            }
        }
    }

    async fn run_intent_inner(&self, id: &str) -> Result<(), String> {
        let record = match self.advance(id, IntentStatus::Executing) {
            Some(record) => record,
            None => return Ok(()), // Lost to TTL or cancel; nothing to do.
        };
        if let Err(e) = self.store.update_status(id, IntentStatus::Executing) {
            warn!(id, error = %e, "Write-through status update failed");
        }
        self.hub.publish(IntentEventKind::Executing, record.clone());

        let spec = self
            .registry
            .spec(record.kind)
            .ok_or_else(|| format!("no spec for {}", record.kind))?;

        // Run the executor on its own task so a panic is contained and
        // surfaces as EXECUTOR_FAILED.
        let executor = Arc::clone(&spec.executor);
        let exec_record = record.clone();
        let executed =
            tokio::spawn(async move { executor.execute(&exec_record).await }).await;

        let mut receipt = match executed {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(join_err) => return Err(format!("executor panicked: {join_err}")),
        };

        // Bounded verification: settle for `unverified` rather than block.
        if let Some(verifier) = &spec.verifier {
            let mut verified = false;
            for attempt in 0..=self.config.verify_retries {
                let outcome = verifier.verify(&record, &receipt).await;
                receipt.verification_evidence.extend(outcome.evidence);
                if outcome.verified {
                    verified = true;
                    break;
                }
                if attempt < self.config.verify_retries {
                    tokio::time::sleep(Duration::from_millis(self.config.verify_backoff_ms)).await;
                }
            }
            receipt.verification = Some(if verified {
                Verification::Verified
            } else {
                Verification::Unverified
            });
            if !verified {
                warn!(id, "Effect unverified after retry budget");
            }
        }

        self.resolve_terminal(id, IntentStatus::Verified, receipt)
            .await;
        Ok(())
    }

    /// TTL watcher: fires only while the intent is non-terminal. An
    /// in-flight verification earns one bounded grace extension.
    async fn ttl_watch(&self, id: String) {
        let deadline = match self.get(&id) {
            Some(record) => record.ttl_deadline(),
            None => return,
        };
        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        match self.get(&id).map(|r| r.status) {
            Some(IntentStatus::Executing) if self.config.ttl_grace_ms > 0 => {
                // Grace window for verification in flight.
                tokio::time::sleep(Duration::from_millis(self.config.ttl_grace_ms)).await;
            }
            Some(status) if status.is_terminal() => return,
            None => return,
            _ => {}
        }

        let receipt = IntentReceipt::failed("ttl_exceeded");
        if self
            .resolve_terminal(&id, IntentStatus::Expired, receipt)
            .await
            .is_some()
        {
            warn!(id = %id, "Intent expired (ttl_exceeded)");
        }
    }
}
