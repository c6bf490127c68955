//! # Tunable Catalog
//!
//! The static description of every operator-tunable: value schema, safety
//! class, console widget, and apply mode. Resolution and overrides live in
//! the registry; this module is pure data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON type a tunable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    Integer,
    Boolean,
    String,
}

/// Per-key validation schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSchema {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Closed set of allowed values (enum keys).
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl ValueSchema {
    #[must_use]
    pub fn number(min: f64, max: f64) -> Self {
        Self {
            value_type: ValueType::Number,
            min: Some(min),
            max: Some(max),
            allowed: None,
        }
    }

    #[must_use]
    pub fn integer(min: f64, max: f64) -> Self {
        Self {
            value_type: ValueType::Integer,
            min: Some(min),
            max: Some(max),
            allowed: None,
        }
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self {
            value_type: ValueType::Boolean,
            min: None,
            max: None,
            allowed: None,
        }
    }

    #[must_use]
    pub fn string_enum(allowed: &[&str]) -> Self {
        Self {
            value_type: ValueType::String,
            min: None,
            max: None,
            allowed: Some(allowed.iter().map(|s| json!(s)).collect()),
        }
    }

    /// Validate a candidate value against this schema.
    ///
    /// # Errors
    ///
    /// A human-readable description of the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self.value_type {
            ValueType::Number => {
                if !value.is_number() {
                    return Err(format!("expected number, got {value}"));
                }
            }
            ValueType::Integer => {
                if value.as_i64().is_none() && value.as_u64().is_none() {
                    return Err(format!("expected integer, got {value}"));
                }
            }
            ValueType::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("expected boolean, got {value}"));
                }
            }
            ValueType::String => {
                if !value.is_string() {
                    return Err(format!("expected string, got {value}"));
                }
            }
        }
        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(format!("{n} below minimum {min}"));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(format!("{n} above maximum {max}"));
                }
            }
        }
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return Err(format!("{value} not in allowed set"));
            }
        }
        Ok(())
    }
}

/// How an override may move a value relative to the current effective one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    Immutable,
    TightenOnly,
    RaiseOnly,
    Tunable,
}

/// Whether a change takes effect immediately or needs a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    Hot,
    Restart,
}

/// One catalog entry, keyed by dotted name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub default_value: Value,
    pub schema: ValueSchema,
    pub safety: SafetyClass,
    /// Console rendering hint (`number`, `toggle`, `select`, ...).
    pub widget: String,
    pub apply: ApplyMode,
    /// For `tighten_only` keys: true when a LOWER value is riskier, so
    /// tightening means raising.
    #[serde(default)]
    pub lower_is_riskier: bool,
}

/// The full catalog, static after load.
pub type Catalog = HashMap<String, ConfigItem>;

/// A named batch of overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub entries: Vec<(String, Value)>,
}

fn item(
    key: &str,
    default_value: Value,
    schema: ValueSchema,
    safety: SafetyClass,
    widget: &str,
    apply: ApplyMode,
    lower_is_riskier: bool,
) -> (String, ConfigItem) {
    (
        key.to_string(),
        ConfigItem {
            key: key.to_string(),
            default_value,
            schema,
            safety,
            widget: widget.to_string(),
            apply,
            lower_is_riskier,
        },
    )
}

/// The production catalog.
#[must_use]
pub fn default_catalog() -> Catalog {
    [
        // Risk limits. Notional and drawdown tighten downward; liquidity
        // tightens upward (a lower floor admits riskier books).
        item(
            "risk.maxPositionNotional",
            json!(50_000.0),
            ValueSchema::number(0.0, 10_000_000.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        item(
            "risk.maxDailyDrawdownPct",
            json!(5.0),
            ValueSchema::number(0.0, 100.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        item(
            "risk.minLiquidityScore",
            json!(0.3),
            ValueSchema::number(0.0, 1.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            true,
        ),
        item(
            "risk.confirmationThreshold",
            json!(2),
            ValueSchema::integer(1.0, 5.0),
            SafetyClass::RaiseOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        // Execution tunables.
        item(
            "exec.maxSlippageBps",
            json!(15.0),
            ValueSchema::number(0.0, 500.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        item(
            "exec.orderTimeoutMs",
            json!(2_500),
            ValueSchema::integer(100.0, 60_000.0),
            SafetyClass::Tunable,
            "number",
            ApplyMode::Hot,
            false,
        ),
        item(
            "exec.primaryVenue",
            json!("deribit"),
            ValueSchema::string_enum(&["deribit", "binance", "okx"]),
            SafetyClass::Tunable,
            "select",
            ApplyMode::Hot,
            false,
        ),
        item(
            "exec.venueAccount",
            json!("main"),
            ValueSchema::string_enum(&["main"]),
            SafetyClass::Immutable,
            "select",
            ApplyMode::Restart,
            false,
        ),
        // Breaker thresholds.
        item(
            "breaker.rejectRateThreshold",
            json!(0.2),
            ValueSchema::number(0.0, 1.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        item(
            "breaker.heartbeatTimeoutMs",
            json!(3_000),
            ValueSchema::integer(250.0, 30_000.0),
            SafetyClass::TightenOnly,
            "number",
            ApplyMode::Hot,
            false,
        ),
        // Platform plumbing.
        item(
            "system.maxInMemoryIntents",
            json!(10_000),
            ValueSchema::integer(16.0, 1_000_000.0),
            SafetyClass::Tunable,
            "number",
            ApplyMode::Restart,
            false,
        ),
        item(
            "system.sseRetentionEvents",
            json!(2_048),
            ValueSchema::integer(64.0, 65_536.0),
            SafetyClass::Tunable,
            "number",
            ApplyMode::Restart,
            false,
        ),
        item(
            "allocator.rebalanceIntervalSec",
            json!(900),
            ValueSchema::integer(60.0, 86_400.0),
            SafetyClass::Tunable,
            "number",
            ApplyMode::Hot,
            false,
        ),
    ]
    .into_iter()
    .collect()
}

/// Named override batches shipped with the platform.
#[must_use]
pub fn default_presets() -> HashMap<String, Preset> {
    let presets = [
        Preset {
            name: "risk_off".to_string(),
            entries: vec![
                ("risk.maxPositionNotional".to_string(), json!(10_000.0)),
                ("exec.maxSlippageBps".to_string(), json!(5.0)),
                ("risk.minLiquidityScore".to_string(), json!(0.6)),
            ],
        },
        Preset {
            name: "weekend".to_string(),
            entries: vec![
                ("risk.maxPositionNotional".to_string(), json!(25_000.0)),
                ("allocator.rebalanceIntervalSec".to_string(), json!(3_600)),
            ],
        },
    ];
    presets.into_iter().map(|p| (p.name.clone(), p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_keys_are_consistent() {
        let catalog = default_catalog();
        for (key, item) in &catalog {
            assert_eq!(key, &item.key);
            // Defaults always satisfy their own schema.
            assert!(
                item.schema.validate(&item.default_value).is_ok(),
                "default for {key} violates schema"
            );
        }
    }

    #[test]
    fn test_schema_type_checks() {
        let schema = ValueSchema::number(0.0, 10.0);
        assert!(schema.validate(&json!(5.0)).is_ok());
        assert!(schema.validate(&json!("five")).is_err());
        assert!(schema.validate(&json!(11.0)).is_err());
        assert!(schema.validate(&json!(-1.0)).is_err());
    }

    #[test]
    fn test_integer_schema_rejects_fraction() {
        let schema = ValueSchema::integer(0.0, 10.0);
        assert!(schema.validate(&json!(3)).is_ok());
        assert!(schema.validate(&json!(3.5)).is_err());
    }

    #[test]
    fn test_enum_schema() {
        let schema = ValueSchema::string_enum(&["a", "b"]);
        assert!(schema.validate(&json!("a")).is_ok());
        assert!(schema.validate(&json!("c")).is_err());
    }

    #[test]
    fn test_presets_reference_known_keys() {
        let catalog = default_catalog();
        for preset in default_presets().values() {
            for (key, value) in &preset.entries {
                let item = catalog.get(key).expect("preset key in catalog");
                assert!(item.schema.validate(value).is_ok());
            }
        }
    }
}
