//! # Audit Log
//!
//! Signed, append-only receipts for every state-changing action. Entries
//! are mirrored to the bus so downstream consumers (consoles, archival)
//! see the same stream that replay reads.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use shared_bus::{subjects, EventPublisher};
use shared_crypto::{sign_value, verify_value, OpsSecret};
use shared_types::{AuditRecord, LedgerError};

use crate::journal::JournalFile;
use crate::seq::LedgerSeq;

/// The view of an audit record that the signature covers (everything but
/// the signature itself).
fn signing_view(record: &AuditRecord) -> Value {
    serde_json::json!({
        "seq": record.seq,
        "event_type": record.event_type,
        "actor_id": record.actor_id,
        "action": record.action,
        "timestamp": record.timestamp,
        "details": record.details,
    })
}

/// Append-only signed audit log.
pub struct AuditLog {
    secret: OpsSecret,
    seq: LedgerSeq,
    records: RwLock<Vec<AuditRecord>>,
    journal: Option<JournalFile>,
    publisher: RwLock<Option<Arc<dyn EventPublisher>>>,
}

impl AuditLog {
    /// Memory-only log (tests, ephemeral runs).
    #[must_use]
    pub fn in_memory(secret: OpsSecret, seq: LedgerSeq) -> Self {
        Self {
            secret,
            seq,
            records: RwLock::new(Vec::new()),
            journal: None,
            publisher: RwLock::new(None),
        }
    }

    /// Open the audit journal, verifying every stored signature.
    ///
    /// # Errors
    ///
    /// `LedgerError::SignatureMismatch` if any record fails verification;
    /// a tampered audit chain is never accepted.
    pub fn open<P: AsRef<Path>>(
        path: P,
        secret: OpsSecret,
        seq: LedgerSeq,
    ) -> Result<Self, LedgerError> {
        let (journal, records): (JournalFile, Vec<AuditRecord>) =
            JournalFile::open(path.as_ref())?;

        for record in &records {
            if !verify_value(&secret, &signing_view(record), &record.signature) {
                return Err(LedgerError::SignatureMismatch { seq: record.seq });
            }
            seq.observe(record.seq);
        }
        debug!(path = %journal.path().display(), records = records.len(), "Audit journal verified");

        Ok(Self {
            secret,
            seq,
            records: RwLock::new(records),
            journal: Some(journal),
            publisher: RwLock::new(None),
        })
    }

    /// Attach the bus publisher used to mirror appends.
    pub fn attach_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        *self.publisher.write() = Some(publisher);
    }

    /// Append one signed record and mirror it to the bus.
    ///
    /// # Errors
    ///
    /// `LedgerError::Io` if the journal write fails. The in-memory record
    /// is still kept in that case; durability degrades, auditing does not.
    pub async fn append(
        &self,
        event_type: &str,
        actor_id: &str,
        action: &str,
        details: Value,
    ) -> Result<AuditRecord, LedgerError> {
        let mut record = AuditRecord {
            seq: self.seq.next(),
            event_type: event_type.to_string(),
            actor_id: actor_id.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
            details,
            signature: String::new(),
        };
        record.signature = sign_value(&self.secret, &signing_view(&record))
            .map_err(|e| LedgerError::Io(e.to_string()))?;

        let line = serde_json::to_string(&record).map_err(|e| LedgerError::Io(e.to_string()))?;
        self.records.write().push(record.clone());

        let mut io_result = Ok(());
        if let Some(journal) = &self.journal {
            io_result = journal.append_line(&line);
            if let Err(e) = &io_result {
                error!(seq = record.seq, error = %e, "Audit journal append failed");
            }
        }

        let publisher = self.publisher.read().clone();
        if let Some(publisher) = publisher {
            let payload = serde_json::to_value(&record).unwrap_or_default();
            if let Err(e) = publisher.publish(subjects::AUDIT_OPERATOR, payload).await {
                error!(seq = record.seq, error = %e, "Audit mirror publish failed");
            }
        }

        io_result.map(|()| record)
    }

    /// Records with `timestamp <= through`, in seq order.
    #[must_use]
    pub fn records_through(&self, through: DateTime<Utc>) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.timestamp <= through)
            .cloned()
            .collect()
    }

    /// All records, in seq order.
    #[must_use]
    pub fn all(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret() -> OpsSecret {
        OpsSecret::new(b"audit-secret".to_vec())
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_seq() {
        let log = AuditLog::in_memory(secret(), LedgerSeq::new());
        let a = log
            .append("intent", "op-1", "ARM", json!({}))
            .await
            .unwrap();
        let b = log
            .append("intent", "op-1", "DISARM", json!({}))
            .await
            .unwrap();
        assert!(a.seq < b.seq);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_appended_records_are_signed() {
        let log = AuditLog::in_memory(secret(), LedgerSeq::new());
        let record = log
            .append("breaker_trip", "reflex", "trip:reflex", json!({"reason": "flash-crash"}))
            .await
            .unwrap();
        assert!(verify_value(
            &secret(),
            &signing_view(&record),
            &record.signature
        ));
    }

    #[tokio::test]
    async fn test_journal_round_trip_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&path, secret(), LedgerSeq::new()).unwrap();
            log.append("intent", "op-1", "ARM", json!({"armed": true}))
                .await
                .unwrap();
            log.append("config_override", "op-2", "override", json!({"key": "risk.max"}))
                .await
                .unwrap();
        }

        let seq = LedgerSeq::new();
        let reopened = AuditLog::open(&path, secret(), seq.clone()).unwrap();
        assert_eq!(reopened.len(), 2);
        // New appends continue after the stored maximum.
        assert_eq!(seq.next(), 3);
    }

    #[tokio::test]
    async fn test_tampered_journal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let log = AuditLog::open(&path, secret(), LedgerSeq::new()).unwrap();
            log.append("intent", "op-1", "ARM", json!({})).await.unwrap();
        }

        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("op-1", "op-9");
        std::fs::write(&path, tampered).unwrap();

        let result = AuditLog::open(&path, secret(), LedgerSeq::new());
        assert!(matches!(
            result,
            Err(LedgerError::SignatureMismatch { seq: 1 })
        ));
    }

    #[tokio::test]
    async fn test_appends_mirror_to_bus() {
        use shared_bus::InMemoryEventBus;

        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(subjects::AUDIT_OPERATOR);

        let log = AuditLog::in_memory(secret(), LedgerSeq::new());
        log.attach_publisher(bus.clone());
        log.append("intent", "op-1", "HALT", json!({})).await.unwrap();

        let msg = tokio::time::timeout(std::time::Duration::from_millis(200), sub.recv())
            .await
            .expect("timeout")
            .expect("message");
        let mirrored: AuditRecord = msg.decode().unwrap();
        assert_eq!(mirrored.action, "HALT");
    }

    #[tokio::test]
    async fn test_records_through_filters_by_time() {
        let log = AuditLog::in_memory(secret(), LedgerSeq::new());
        let first = log.append("intent", "op", "ARM", json!({})).await.unwrap();
        let cutoff = first.timestamp;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        log.append("intent", "op", "DISARM", json!({})).await.unwrap();

        let through = log.records_through(cutoff);
        assert_eq!(through.len(), 1);
        assert_eq!(through[0].action, "ARM");
    }
}
