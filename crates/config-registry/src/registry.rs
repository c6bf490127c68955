//! Provenance-layered resolution, overrides, rollback, and presets.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use shared_bus::{ConfigChangedEvent, EventPublisher};
use shared_crypto::OpsSecret;
use shared_types::{OverrideReceipt, ReceiptAction};

use crate::catalog::{Catalog, Preset, SafetyClass};
use crate::receipts::{sign_receipt, ReceiptJournal};
use crate::ConfigError;

/// Where a resolved value came from. Later layers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceLayer {
    Default,
    File,
    Env,
    Override,
}

/// One link in a key's provenance chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub layer: ProvenanceLayer,
    pub value: Value,
}

/// A key's effective value plus its full provenance chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveValue {
    pub key: String,
    pub value: Value,
    pub provenance: Vec<ProvenanceEntry>,
}

/// Per-key outcome of a preset application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetKeyOutcome {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying a named preset. Partial failure is normal: each key
/// reports independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetOutcome {
    pub preset: String,
    pub outcomes: Vec<PresetKeyOutcome>,
}

#[derive(Debug, Clone)]
struct ActiveOverride {
    value: Value,
    receipt_id: String,
}

/// The config registry. Catalog and file/env layers are fixed at
/// construction; the override set is the mutable surface.
pub struct ConfigRegistry {
    catalog: Catalog,
    presets: HashMap<String, Preset>,
    file_layer: HashMap<String, Value>,
    env_layer: HashMap<String, Value>,
    overrides: RwLock<Arc<HashMap<String, ActiveOverride>>>,
    receipts: RwLock<Vec<OverrideReceipt>>,
    journal: Option<ReceiptJournal>,
    secret: OpsSecret,
    publisher: RwLock<Option<Arc<dyn EventPublisher>>>,
}

impl ConfigRegistry {
    /// Registry without receipt persistence (tests, ephemeral runs).
    #[must_use]
    pub fn in_memory(catalog: Catalog, presets: HashMap<String, Preset>, secret: OpsSecret) -> Self {
        Self {
            catalog,
            presets,
            file_layer: HashMap::new(),
            env_layer: HashMap::new(),
            overrides: RwLock::new(Arc::new(HashMap::new())),
            receipts: RwLock::new(Vec::new()),
            journal: None,
            secret,
            publisher: RwLock::new(None),
        }
    }

    /// Open the registry with a durable receipt chain. The chain is
    /// verified and replayed to reconstruct the active override set.
    ///
    /// # Errors
    ///
    /// `ConfigError::ReceiptChain` if any stored receipt fails signature
    /// verification or cannot be parsed.
    pub fn open<P: AsRef<Path>>(
        catalog: Catalog,
        presets: HashMap<String, Preset>,
        secret: OpsSecret,
        receipts_path: P,
    ) -> Result<Self, ConfigError> {
        let (journal, stored) = ReceiptJournal::open(receipts_path.as_ref(), &secret)?;

        let mut overrides: HashMap<String, ActiveOverride> = HashMap::new();
        for receipt in &stored {
            if !catalog.contains_key(&receipt.key) {
                warn!(key = %receipt.key, receipt = %receipt.id, "Receipt for unknown key ignored");
                continue;
            }
            match receipt.action {
                ReceiptAction::Override => {
                    overrides.insert(
                        receipt.key.clone(),
                        ActiveOverride {
                            value: receipt.new_value.clone(),
                            receipt_id: receipt.id.clone(),
                        },
                    );
                }
                ReceiptAction::Rollback => {
                    overrides.remove(&receipt.key);
                }
            }
        }
        info!(
            receipts = stored.len(),
            active_overrides = overrides.len(),
            "Receipt chain verified and replayed"
        );

        Ok(Self {
            catalog,
            presets,
            file_layer: HashMap::new(),
            env_layer: HashMap::new(),
            overrides: RwLock::new(Arc::new(overrides)),
            receipts: RwLock::new(stored),
            journal: Some(journal),
            secret,
            publisher: RwLock::new(None),
        })
    }

    /// Install the file provenance layer (call before serving).
    #[must_use]
    pub fn with_file_layer(mut self, layer: HashMap<String, Value>) -> Self {
        self.file_layer = layer;
        self
    }

    /// Install the env provenance layer (call before serving).
    #[must_use]
    pub fn with_env_layer(mut self, layer: HashMap<String, Value>) -> Self {
        self.env_layer = layer;
        self
    }

    /// Attach the bus publisher for `evt.config.changed.v1`.
    pub fn attach_publisher(&self, publisher: Arc<dyn EventPublisher>) {
        *self.publisher.write() = Some(publisher);
    }

    /// Resolve a key's effective value and full provenance chain.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownKey` for keys outside the catalog.
    pub fn get_effective(&self, key: &str) -> Result<EffectiveValue, ConfigError> {
        let item = self
            .catalog
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let mut provenance = vec![ProvenanceEntry {
            layer: ProvenanceLayer::Default,
            value: item.default_value.clone(),
        }];
        if let Some(v) = self.file_layer.get(key) {
            provenance.push(ProvenanceEntry {
                layer: ProvenanceLayer::File,
                value: v.clone(),
            });
        }
        if let Some(v) = self.env_layer.get(key) {
            provenance.push(ProvenanceEntry {
                layer: ProvenanceLayer::Env,
                value: v.clone(),
            });
        }
        let overrides = self.overrides.read().clone();
        if let Some(active) = overrides.get(key) {
            provenance.push(ProvenanceEntry {
                layer: ProvenanceLayer::Override,
                value: active.value.clone(),
            });
        }

        // Chain construction guarantees at least the default entry.
        let value = provenance
            .last()
            .map(|e| e.value.clone())
            .unwrap_or(Value::Null);
        Ok(EffectiveValue {
            key: key.to_string(),
            value,
            provenance,
        })
    }

    /// Effective value only (no provenance), for hot-path readers.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownKey` for keys outside the catalog.
    pub fn effective_value(&self, key: &str) -> Result<Value, ConfigError> {
        self.get_effective(key).map(|e| e.value)
    }

    /// Top-of-provenance summary for every catalog key, sorted.
    #[must_use]
    pub fn effective_summary(&self) -> BTreeMap<String, EffectiveValue> {
        let mut summary = BTreeMap::new();
        for key in self.catalog.keys() {
            if let Ok(effective) = self.get_effective(key) {
                summary.insert(key.clone(), effective);
            }
        }
        summary
    }

    /// Create an override after schema and safety checks, append its
    /// signed receipt, swap the active set, and announce the change.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`]; no receipt is appended on any rejection.
    pub async fn create_override(
        &self,
        key: &str,
        value: Value,
        operator_id: &str,
        reason: &str,
    ) -> Result<OverrideReceipt, ConfigError> {
        let item = self
            .catalog
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let current = self.effective_value(key)?;

        item.schema
            .validate(&value)
            .map_err(|detail| ConfigError::SchemaViolation {
                key: key.to_string(),
                detail,
            })?;

        enforce_safety(item.safety, item.lower_is_riskier, key, &current, &value)?;

        let mut receipt = OverrideReceipt {
            id: Uuid::new_v4().to_string(),
            key: key.to_string(),
            previous_value: current,
            new_value: value.clone(),
            operator_id: operator_id.to_string(),
            reason: reason.to_string(),
            action: ReceiptAction::Override,
            timestamp: Utc::now(),
            signature: String::new(),
            reverses: None,
        };
        receipt.signature = sign_receipt(&self.secret, &receipt)?;

        // Receipt first: an override that is not on the chain never
        // becomes active.
        if let Some(journal) = &self.journal {
            journal.append(&receipt)?;
        }

        {
            let mut overrides = self.overrides.write();
            let mut next = (**overrides).clone();
            next.insert(
                key.to_string(),
                ActiveOverride {
                    value: value.clone(),
                    receipt_id: receipt.id.clone(),
                },
            );
            *overrides = Arc::new(next);
        }
        self.receipts.write().push(receipt.clone());

        info!(key, operator = operator_id, receipt = %receipt.id, "Config override applied");
        self.announce(key, value, "override", &receipt.id).await;
        Ok(receipt)
    }

    /// Roll a key back to its next-lower provenance layer, issuing a
    /// rollback receipt that references the reversed override.
    ///
    /// # Errors
    ///
    /// `ConfigError::NoActiveOverride` when the key has no override.
    pub async fn rollback(
        &self,
        key: &str,
        operator_id: &str,
    ) -> Result<OverrideReceipt, ConfigError> {
        if !self.catalog.contains_key(key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let active = {
            let overrides = self.overrides.read().clone();
            overrides
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::NoActiveOverride(key.to_string()))?
        };

        // The value the key falls back to once the override is removed.
        let restored = {
            let chain = self.get_effective(key)?;
            chain
                .provenance
                .iter()
                .rev()
                .find(|e| e.layer != ProvenanceLayer::Override)
                .map(|e| e.value.clone())
                .unwrap_or(Value::Null)
        };

        let mut receipt = OverrideReceipt {
            id: Uuid::new_v4().to_string(),
            key: key.to_string(),
            previous_value: active.value,
            new_value: restored.clone(),
            operator_id: operator_id.to_string(),
            reason: "rollback".to_string(),
            action: ReceiptAction::Rollback,
            timestamp: Utc::now(),
            signature: String::new(),
            reverses: Some(active.receipt_id),
        };
        receipt.signature = sign_receipt(&self.secret, &receipt)?;

        if let Some(journal) = &self.journal {
            journal.append(&receipt)?;
        }

        {
            let mut overrides = self.overrides.write();
            let mut next = (**overrides).clone();
            next.remove(key);
            *overrides = Arc::new(next);
        }
        self.receipts.write().push(receipt.clone());

        info!(key, operator = operator_id, receipt = %receipt.id, "Config override rolled back");
        self.announce(key, restored, "rollback", &receipt.id).await;
        Ok(receipt)
    }

    /// Apply a named preset. Each key reports independently; one bad key
    /// never blocks the others.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownPreset` only; per-key failures land in the
    /// outcome list.
    pub async fn apply_preset(
        &self,
        name: &str,
        operator_id: &str,
    ) -> Result<PresetOutcome, ConfigError> {
        let preset = self
            .presets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?;

        let reason = format!("preset:{name}");
        let mut outcomes = Vec::with_capacity(preset.entries.len());
        for (key, value) in preset.entries {
            match self
                .create_override(&key, value, operator_id, &reason)
                .await
            {
                Ok(receipt) => outcomes.push(PresetKeyOutcome {
                    key,
                    receipt_id: Some(receipt.id),
                    error: None,
                }),
                Err(e) => outcomes.push(PresetKeyOutcome {
                    key,
                    receipt_id: None,
                    error: Some(e.to_string()),
                }),
            }
        }
        Ok(PresetOutcome {
            preset: name.to_string(),
            outcomes,
        })
    }

    /// All receipts, append order.
    #[must_use]
    pub fn receipts(&self) -> Vec<OverrideReceipt> {
        self.receipts.read().clone()
    }

    /// Active override count.
    #[must_use]
    pub fn active_override_count(&self) -> usize {
        self.overrides.read().len()
    }

    /// The catalog, for schema introspection.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn announce(&self, key: &str, new_value: Value, action: &str, receipt_id: &str) {
        let publisher = self.publisher.read().clone();
        if let Some(publisher) = publisher {
            let event = ConfigChangedEvent {
                key: key.to_string(),
                new_value,
                action: action.to_string(),
                receipt_id: receipt_id.to_string(),
                at: Utc::now(),
            };
            let msg = event.to_message();
            if let Err(e) = publisher.publish(&msg.subject, msg.payload).await {
                warn!(key, error = %e, "Config change publish failed");
            }
        }
    }
}

/// Enforce the safety class against the current effective value.
fn enforce_safety(
    safety: SafetyClass,
    lower_is_riskier: bool,
    key: &str,
    current: &Value,
    candidate: &Value,
) -> Result<(), ConfigError> {
    match safety {
        SafetyClass::Tunable => Ok(()),
        SafetyClass::Immutable => Err(ConfigError::Immutable(key.to_string())),
        SafetyClass::TightenOnly => {
            let (cur, new) = numeric_pair(key, current, candidate)?;
            let ok = if lower_is_riskier { new >= cur } else { new <= cur };
            if ok {
                Ok(())
            } else {
                let direction = if lower_is_riskier { ">=" } else { "<=" };
                Err(ConfigError::TightenOnly {
                    key: key.to_string(),
                    detail: format!("new value {new} must be {direction} current {cur}"),
                })
            }
        }
        SafetyClass::RaiseOnly => {
            let (cur, new) = numeric_pair(key, current, candidate)?;
            if new >= cur {
                Ok(())
            } else {
                Err(ConfigError::RaiseOnly {
                    key: key.to_string(),
                    detail: format!("new value {new} must be >= current {cur}"),
                })
            }
        }
    }
}

fn numeric_pair(key: &str, current: &Value, candidate: &Value) -> Result<(f64, f64), ConfigError> {
    match (current.as_f64(), candidate.as_f64()) {
        (Some(cur), Some(new)) => Ok((cur, new)),
        _ => Err(ConfigError::SchemaViolation {
            key: key.to_string(),
            detail: "directional safety class requires numeric values".to_string(),
        }),
    }
}
