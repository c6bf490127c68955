//! JSON-lines repository adapter.
//!
//! Every mutation appends the full post-mutation record as one JSON line.
//! Opening the store replays the journal: later lines upsert earlier ones,
//! with terminal records never losing to stale non-terminal lines. The
//! journal is guarded by an advisory flock so two processes cannot
//! interleave appends.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::{info, warn};

use shared_types::{IntentKind, IntentReceipt, IntentRecord, IntentStatus, StoreError};

use crate::adapters::memory::InMemoryIntentStore;
use crate::ports::{IntentFilter, IntentRepository};

/// Durable repository: in-memory index plus an append-only journal file.
pub struct JsonlIntentStore {
    index: InMemoryIntentStore,
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlIntentStore {
    /// Open (or create) the journal at `path` and replay it into memory.
    ///
    /// # Errors
    ///
    /// `StoreError::Persistence` on I/O failure or when another process
    /// holds the journal lock.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Persistence(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        file.try_lock_exclusive()
            .map_err(|e| StoreError::Persistence(format!("journal locked: {e}")))?;

        let index = InMemoryIntentStore::new();
        let mut lines = 0usize;
        let reader = BufReader::new(
            File::open(&path).map_err(|e| StoreError::Persistence(e.to_string()))?,
        );
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| StoreError::Persistence(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IntentRecord>(&line) {
                Ok(record) => {
                    index.apply_loaded(record);
                    lines += 1;
                }
                Err(e) => {
                    // A torn tail line (crash mid-append) is tolerated;
                    // anything else in the middle of the journal is not.
                    warn!(path = %path.display(), line = line_no + 1, error = %e, "Skipping malformed journal line");
                }
            }
        }
        info!(path = %path.display(), lines, records = index.len(), "Intent journal replayed");

        Ok(Self {
            index,
            file: Mutex::new(file),
            path,
        })
    }

    /// Journal location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, id: &str) -> Result<(), StoreError> {
        let Some(record) = self.index.snapshot(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let line =
            serde_json::to_string(&record).map_err(|e| StoreError::Persistence(e.to_string()))?;
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|e| StoreError::Persistence(e.to_string()))?;
        file.flush().map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl IntentRepository for JsonlIntentStore {
    fn insert(&self, record: &IntentRecord) -> Result<(), StoreError> {
        self.index.insert(record)?;
        self.append(&record.id)
    }

    fn update_status(&self, id: &str, new_status: IntentStatus) -> Result<(), StoreError> {
        self.index.update_status(id, new_status)?;
        self.append(id)
    }

    fn resolve(
        &self,
        id: &str,
        terminal: IntentStatus,
        receipt: IntentReceipt,
    ) -> Result<(), StoreError> {
        self.index.resolve(id, terminal, receipt)?;
        self.append(id)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<IntentRecord>, StoreError> {
        self.index.find_by_id(id)
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<IntentRecord>, StoreError> {
        self.index.find_by_idempotency_key(key)
    }

    fn find_recent(
        &self,
        limit: usize,
        kind: Option<IntentKind>,
    ) -> Result<Vec<IntentRecord>, StoreError> {
        self.index.find_recent(limit, kind)
    }

    fn find_filtered(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>, StoreError> {
        self.index.find_filtered(filter)
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
