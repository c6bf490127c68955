//! # Fill Journal
//!
//! Durable record of every fill report from the execution pipeline,
//! sequenced on the shared ledger counter so replay can interleave fills
//! with audit records deterministically.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, error};

use shared_bus::FillEvent;
use shared_types::{FillRecord, LedgerError};

use crate::journal::JournalFile;
use crate::seq::LedgerSeq;

/// Append-only journal of fills.
pub struct FillJournal {
    seq: LedgerSeq,
    records: RwLock<Vec<FillRecord>>,
    journal: Option<JournalFile>,
}

impl FillJournal {
    /// Memory-only journal (tests, ephemeral runs).
    #[must_use]
    pub fn in_memory(seq: LedgerSeq) -> Self {
        Self {
            seq,
            records: RwLock::new(Vec::new()),
            journal: None,
        }
    }

    /// Open the fill journal and bump the shared sequence past its tail.
    ///
    /// # Errors
    ///
    /// `LedgerError` on I/O failure or a malformed mid-journal line.
    pub fn open<P: AsRef<Path>>(path: P, seq: LedgerSeq) -> Result<Self, LedgerError> {
        let (journal, records): (JournalFile, Vec<FillRecord>) =
            JournalFile::open(path.as_ref())?;
        for record in &records {
            seq.observe(record.seq);
        }
        debug!(path = %journal.path().display(), records = records.len(), "Fill journal replayed");
        Ok(Self {
            seq,
            records: RwLock::new(records),
            journal: Some(journal),
        })
    }

    /// Record one fill event.
    ///
    /// # Errors
    ///
    /// `LedgerError::Io` when the journal write fails; the in-memory
    /// record is kept regardless.
    pub fn append(&self, event: &FillEvent) -> Result<FillRecord, LedgerError> {
        let record = FillRecord {
            seq: self.seq.next(),
            venue: event.venue.clone(),
            symbol: event.symbol.clone(),
            side: event.side,
            qty: event.qty,
            price: event.price,
            timestamp: event.timestamp,
            shadow: event.shadow,
        };

        let line = serde_json::to_string(&record).map_err(|e| LedgerError::Io(e.to_string()))?;
        self.records.write().push(record.clone());

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append_line(&line) {
                error!(seq = record.seq, error = %e, "Fill journal append failed");
                return Err(e);
            }
        }
        Ok(record)
    }

    /// Records with `timestamp <= through`, in seq order.
    #[must_use]
    pub fn records_through(&self, through: DateTime<Utc>) -> Vec<FillRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.timestamp <= through)
            .cloned()
            .collect()
    }

    /// All records, in seq order.
    #[must_use]
    pub fn all(&self) -> Vec<FillRecord> {
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
