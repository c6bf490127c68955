//! In-memory repository adapter.
//!
//! Backs tests and serves as the index layer under the JSONL adapter.

use std::collections::HashMap;

use parking_lot::Mutex;

use shared_types::{IntentKind, IntentReceipt, IntentRecord, IntentStatus, StoreError};

use crate::ports::{IntentFilter, IntentRepository};

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, IntentRecord>,
    idem_index: HashMap<String, String>,
    /// Insertion order, oldest first.
    order: Vec<String>,
}

/// HashMap-backed repository.
#[derive(Default)]
pub struct InMemoryIntentStore {
    inner: Mutex<Inner>,
}

impl InMemoryIntentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record during journal replay, bypassing uniqueness checks:
    /// later lines upsert earlier ones, but a terminal record is never
    /// overwritten by a non-terminal line.
    pub(crate) fn apply_loaded(&self, record: IntentRecord) {
        let mut inner = self.inner.lock();
        match inner.by_id.get(&record.id) {
            Some(existing) if existing.status.is_terminal() && !record.status.is_terminal() => {}
            Some(_) => {
                inner
                    .idem_index
                    .insert(record.idempotency_key.clone(), record.id.clone());
                inner.by_id.insert(record.id.clone(), record);
            }
            None => {
                inner
                    .idem_index
                    .insert(record.idempotency_key.clone(), record.id.clone());
                inner.order.push(record.id.clone());
                inner.by_id.insert(record.id.clone(), record);
            }
        }
    }

    /// Fetch the stored record after a mutation (used by the JSONL adapter
    /// to append the post-mutation state).
    pub(crate) fn snapshot(&self, id: &str) -> Option<IntentRecord> {
        self.inner.lock().by_id.get(id).cloned()
    }
}

impl IntentRepository for InMemoryIntentStore {
    fn insert(&self, record: &IntentRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.by_id.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id.clone()));
        }
        if inner.idem_index.contains_key(&record.idempotency_key) {
            return Err(StoreError::DuplicateIdempotencyKey(
                record.idempotency_key.clone(),
            ));
        }
        inner
            .idem_index
            .insert(record.idempotency_key.clone(), record.id.clone());
        inner.order.push(record.id.clone());
        inner.by_id.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update_status(&self, id: &str, new_status: IntentStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if new_status.is_terminal() || !record.status.can_transition_to(new_status) {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: new_status.to_string(),
            });
        }
        record.status = new_status;
        Ok(())
    }

    fn resolve(
        &self,
        id: &str,
        terminal: IntentStatus,
        receipt: IntentReceipt,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if record.status.is_terminal() {
            return Err(StoreError::AlreadyResolved(id.to_string()));
        }
        if !terminal.is_terminal() || !record.status.can_transition_to(terminal) {
            return Err(StoreError::IllegalTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: terminal.to_string(),
            });
        }
        record.status = terminal;
        record.receipt = Some(receipt);
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<IntentRecord>, StoreError> {
        Ok(self.inner.lock().by_id.get(id).cloned())
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<IntentRecord>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .idem_index
            .get(key)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    fn find_recent(
        &self,
        limit: usize,
        kind: Option<IntentKind>,
    ) -> Result<Vec<IntentRecord>, StoreError> {
        let inner = self.inner.lock();
        let records = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .take(if limit == 0 { usize::MAX } else { limit })
            .cloned()
            .collect();
        Ok(records)
    }

    fn find_filtered(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>, StoreError> {
        let inner = self.inner.lock();
        let records = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|r| filter.kind.map_or(true, |k| r.kind == k))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                filter
                    .operator_id
                    .as_ref()
                    .map_or(true, |op| &r.operator_id == op)
            })
            .take(if filter.limit == 0 {
                usize::MAX
            } else {
                filter.limit
            })
            .cloned()
            .collect();
        Ok(records)
    }

    fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::DangerLevel;

    fn record(id: &str, idem: &str, kind: IntentKind) -> IntentRecord {
        IntentRecord {
            id: id.to_string(),
            idempotency_key: idem.to_string(),
            version: 1,
            kind,
            params: serde_json::json!({}),
            operator_id: "op-1".into(),
            reason: "test".into(),
            submitted_at: Utc::now(),
            ttl_seconds: 30,
            state_hash: None,
            signature: "00".repeat(32),
            status: IntentStatus::Accepted,
            danger_level: DangerLevel::Safe,
            receipt: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        assert!(store.find_by_id("i-1").unwrap().is_some());
        assert!(store.find_by_idempotency_key("k-1").unwrap().is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        let err = store
            .insert(&record("i-1", "k-2", IntentKind::Arm))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateId("i-1".into()));
    }

    #[test]
    fn test_duplicate_idempotency_key_rejected() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        let err = store
            .insert(&record("i-2", "k-1", IntentKind::Arm))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateIdempotencyKey("k-1".into()));
    }

    #[test]
    fn test_status_walk_to_resolution() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        store.update_status("i-1", IntentStatus::Executing).unwrap();
        store
            .resolve("i-1", IntentStatus::Verified, IntentReceipt::applied("armed"))
            .unwrap();

        let stored = store.find_by_id("i-1").unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Verified);
        assert!(stored.receipt.is_some());
    }

    #[test]
    fn test_update_status_rejects_terminal_target() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        let err = store
            .update_status("i-1", IntentStatus::Verified)
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[test]
    fn test_resolve_is_single_shot() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        store
            .resolve("i-1", IntentStatus::Failed, IntentReceipt::failed("boom"))
            .unwrap();
        let err = store
            .resolve("i-1", IntentStatus::Verified, IntentReceipt::applied("x"))
            .unwrap_err();
        assert_eq!(err, StoreError::AlreadyResolved("i-1".into()));
    }

    #[test]
    fn test_find_recent_orders_newest_first() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        store
            .insert(&record("i-2", "k-2", IntentKind::Disarm))
            .unwrap();
        store
            .insert(&record("i-3", "k-3", IntentKind::Arm))
            .unwrap();

        let recent = store.find_recent(2, None).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "i-3");
        assert_eq!(recent[1].id, "i-2");

        let arms = store.find_recent(10, Some(IntentKind::Arm)).unwrap();
        assert_eq!(arms.len(), 2);
    }

    #[test]
    fn test_find_filtered_by_status_and_operator() {
        let store = InMemoryIntentStore::new();
        store.insert(&record("i-1", "k-1", IntentKind::Arm)).unwrap();
        let mut other = record("i-2", "k-2", IntentKind::Arm);
        other.operator_id = "op-2".into();
        store.insert(&other).unwrap();
        store.update_status("i-1", IntentStatus::Executing).unwrap();

        let filter = IntentFilter {
            status: Some(IntentStatus::Executing),
            ..Default::default()
        };
        let hits = store.find_filtered(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "i-1");

        let filter = IntentFilter {
            operator_id: Some("op-2".into()),
            ..Default::default()
        };
        let hits = store.find_filtered(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "i-2");
    }

    #[test]
    fn test_loaded_terminal_record_wins_over_nonterminal_line() {
        let store = InMemoryIntentStore::new();
        let mut terminal = record("i-1", "k-1", IntentKind::Arm);
        terminal.status = IntentStatus::Verified;
        store.apply_loaded(terminal);
        store.apply_loaded(record("i-1", "k-1", IntentKind::Arm));

        let stored = store.find_by_id("i-1").unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Verified);
    }
}
