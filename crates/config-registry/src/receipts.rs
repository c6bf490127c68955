//! Signed receipt chain persistence.
//!
//! Receipts are JSON lines; on open every signature must verify or the
//! chain is rejected outright.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::Value;

use shared_crypto::{sign_value, verify_value, OpsSecret};
use shared_types::OverrideReceipt;

use crate::ConfigError;

/// The receipt view covered by the signature (all fields but the
/// signature itself, in wire naming).
pub(crate) fn signing_view(receipt: &OverrideReceipt) -> Value {
    let mut view = serde_json::json!({
        "id": receipt.id,
        "key": receipt.key,
        "previousValue": receipt.previous_value,
        "newValue": receipt.new_value,
        "operatorId": receipt.operator_id,
        "reason": receipt.reason,
        "action": receipt.action,
        "timestamp": receipt.timestamp,
    });
    if let Some(reverses) = &receipt.reverses {
        view["reverses"] = serde_json::json!(reverses);
    }
    view
}

pub(crate) fn sign_receipt(
    secret: &OpsSecret,
    receipt: &OverrideReceipt,
) -> Result<String, ConfigError> {
    sign_value(secret, &signing_view(receipt)).map_err(|e| ConfigError::Persistence(e.to_string()))
}

pub(crate) struct ReceiptJournal {
    file: Mutex<File>,
}

impl ReceiptJournal {
    /// Open the chain, verify every signature, return the receipts in
    /// append order.
    pub(crate) fn open(
        path: &Path,
        secret: &OpsSecret,
    ) -> Result<(Self, Vec<OverrideReceipt>), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Persistence(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| ConfigError::Persistence(e.to_string()))?;
        file.try_lock_exclusive()
            .map_err(|e| ConfigError::Persistence(format!("receipt chain locked: {e}")))?;

        let reader = BufReader::new(
            File::open(path).map_err(|e| ConfigError::Persistence(e.to_string()))?,
        );
        let mut receipts = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ConfigError::Persistence(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let receipt: OverrideReceipt = serde_json::from_str(&line).map_err(|e| {
                ConfigError::ReceiptChain(format!("line {}: {e}", idx + 1))
            })?;
            if !verify_value(secret, &signing_view(&receipt), &receipt.signature) {
                return Err(ConfigError::ReceiptChain(format!(
                    "signature mismatch for receipt {} (line {})",
                    receipt.id,
                    idx + 1
                )));
            }
            receipts.push(receipt);
        }

        Ok((
            Self {
                file: Mutex::new(file),
            },
            receipts,
        ))
    }

    pub(crate) fn append(&self, receipt: &OverrideReceipt) -> Result<(), ConfigError> {
        let line =
            serde_json::to_string(receipt).map_err(|e| ConfigError::Persistence(e.to_string()))?;
        let mut file = self.file.lock();
        writeln!(file, "{line}").map_err(|e| ConfigError::Persistence(e.to_string()))?;
        file.flush().map_err(|e| ConfigError::Persistence(e.to_string()))
    }
}
