//! # Repository Port
//!
//! The interface the intent service writes through. Production uses the
//! JSONL adapter; tests use the in-memory adapter.

use shared_types::{IntentKind, IntentReceipt, IntentRecord, IntentStatus, StoreError};

/// Query shape for `find_filtered`.
#[derive(Debug, Clone, Default)]
pub struct IntentFilter {
    pub kind: Option<IntentKind>,
    pub status: Option<IntentStatus>,
    pub operator_id: Option<String>,
    /// Zero means no limit.
    pub limit: usize,
}

/// Durable store of intent records.
pub trait IntentRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// `DuplicateId` / `DuplicateIdempotencyKey` on collision.
    fn insert(&self, record: &IntentRecord) -> Result<(), StoreError>;

    /// Move a record to a new non-terminal status.
    ///
    /// # Errors
    ///
    /// `IllegalTransition` when the move violates the lifecycle DAG or
    /// targets a terminal status (terminal moves go through [`resolve`]).
    ///
    /// [`resolve`]: IntentRepository::resolve
    fn update_status(&self, id: &str, new_status: IntentStatus) -> Result<(), StoreError>;

    /// Single-shot terminal resolution with receipt.
    ///
    /// # Errors
    ///
    /// `AlreadyResolved` if the record is terminal, `IllegalTransition` if
    /// `terminal` is not actually a terminal status.
    fn resolve(
        &self,
        id: &str,
        terminal: IntentStatus,
        receipt: IntentReceipt,
    ) -> Result<(), StoreError>;

    fn find_by_id(&self, id: &str) -> Result<Option<IntentRecord>, StoreError>;

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<IntentRecord>, StoreError>;

    /// Most recent records first, optionally filtered by kind.
    fn find_recent(
        &self,
        limit: usize,
        kind: Option<IntentKind>,
    ) -> Result<Vec<IntentRecord>, StoreError>;

    fn find_filtered(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>, StoreError>;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
