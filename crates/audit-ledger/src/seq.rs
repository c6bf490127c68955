//! The global ledger sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic sequence shared by the audit log and the fill journal.
///
/// Sequence numbers start at 1; zero means "before any record".
#[derive(Debug, Clone, Default)]
pub struct LedgerSeq {
    next: Arc<AtomicU64>,
}

impl LedgerSeq {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next sequence number.
    #[must_use]
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Raise the counter to at least `seen` (used when replaying journals
    /// at startup so new appends continue after the highest stored seq).
    pub fn observe(&self, seen: u64) {
        self.next.fetch_max(seen, Ordering::SeqCst);
    }

    /// The highest sequence number handed out so far.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
