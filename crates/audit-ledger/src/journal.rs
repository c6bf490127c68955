//! Flock-guarded append-only JSONL file, shared by both ledgers.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::warn;

use shared_types::LedgerError;

pub(crate) struct JournalFile {
    file: Mutex<File>,
    path: PathBuf,
}

impl JournalFile {
    /// Open the journal, take its flock, and return the parsed records.
    ///
    /// A torn tail line (crash mid-append) is skipped with a warning; a
    /// malformed line elsewhere is a hard error.
    pub(crate) fn open<T: DeserializeOwned>(
        path: &Path,
    ) -> Result<(Self, Vec<T>), LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| LedgerError::Io(e.to_string()))?;
        file.try_lock_exclusive()
            .map_err(|e| LedgerError::Io(format!("journal locked: {e}")))?;

        let reader =
            BufReader::new(File::open(path).map_err(|e| LedgerError::Io(e.to_string()))?);
        let lines: Vec<String> = reader
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|e| LedgerError::Io(e.to_string()))?;
        let last = lines.len();

        let mut records = Vec::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(e) if idx + 1 == last => {
                    warn!(path = %path.display(), line = idx + 1, error = %e, "Skipping torn tail line");
                }
                Err(e) => {
                    return Err(LedgerError::Malformed {
                        line: idx + 1,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok((
            Self {
                file: Mutex::new(file),
                path: path.to_path_buf(),
            },
            records,
        ))
    }

    pub(crate) fn append_line(&self, line: &str) -> Result<(), LedgerError> {
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|e| LedgerError::Io(e.to_string()))?;
        file.flush().map_err(|e| LedgerError::Io(e.to_string()))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
