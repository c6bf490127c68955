//! # Intent Type Registry
//!
//! Intent dispatch is data-driven: each kind maps to a spec carrying its
//! parameter schema, danger level, required permission, emergency policy,
//! and executor/verifier bindings. The preview reasoner and the validator
//! work entirely from this metadata, never from concrete types.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use shared_types::{permission_key, DangerLevel, IntentKind};

use crate::exec::{IntentExecutor, IntentVerifier};

/// Expected JSON type of one parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Object,
    /// Any JSON value (e.g. an override's candidate value).
    Any,
}

/// One field of a kind's parameter schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub expect: FieldType,
    /// Closed set of allowed string values.
    pub allowed: Option<&'static [&'static str]>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldSpec {
    fn required(name: &'static str, expect: FieldType) -> Self {
        Self {
            name,
            required: true,
            expect,
            allowed: None,
            min: None,
            max: None,
        }
    }

    fn optional(name: &'static str, expect: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, expect)
        }
    }

    fn with_allowed(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }

    fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }
}

/// Parameter schema for one intent kind.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    pub fields: Vec<FieldSpec>,
}

impl ParamSchema {
    /// Validate `params`, returning every violation found.
    #[must_use]
    pub fn validate(&self, params: &Value) -> Vec<String> {
        let mut reasons = Vec::new();
        let Some(map) = params.as_object() else {
            return vec!["params must be an object".to_string()];
        };

        for field in &self.fields {
            let Some(value) = map.get(field.name) else {
                if field.required {
                    reasons.push(format!("params.{} is required", field.name));
                }
                continue;
            };

            let type_ok = match field.expect {
                FieldType::String => value.is_string(),
                FieldType::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
                FieldType::Number => value.is_number(),
                FieldType::Object => value.is_object(),
                FieldType::Any => true,
            };
            if !type_ok {
                reasons.push(format!(
                    "params.{} has wrong type (got {value})",
                    field.name
                ));
                continue;
            }

            if let Some(allowed) = field.allowed {
                if let Some(s) = value.as_str() {
                    if !allowed.contains(&s) {
                        reasons.push(format!(
                            "params.{} must be one of {}",
                            field.name,
                            allowed.join("|")
                        ));
                    }
                }
            }
            if let Some(n) = value.as_f64() {
                if field.min.is_some_and(|min| n < min) || field.max.is_some_and(|max| n > max) {
                    reasons.push(format!(
                        "params.{} out of range [{}, {}]",
                        field.name,
                        field.min.unwrap_or(f64::NEG_INFINITY),
                        field.max.unwrap_or(f64::INFINITY)
                    ));
                }
            }
        }
        reasons
    }
}

/// Everything the pipeline needs to know about one intent kind.
pub struct IntentSpec {
    pub kind: IntentKind,
    pub schema: ParamSchema,
    pub danger_level: DangerLevel,
    pub required_permission: String,
    /// Whether this kind is still submittable under emergency/halt.
    /// Recovery actions are; anything that adds exposure is not.
    pub allowed_in_emergency: bool,
    pub executor: Arc<dyn IntentExecutor>,
    pub verifier: Option<Arc<dyn IntentVerifier>>,
}

/// The kind → spec table.
#[derive(Default)]
pub struct IntentRegistry {
    specs: HashMap<IntentKind, IntentSpec>,
}

impl IntentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind with its executor and optional verifier.
    pub fn register(
        &mut self,
        kind: IntentKind,
        danger_level: DangerLevel,
        allowed_in_emergency: bool,
        executor: Arc<dyn IntentExecutor>,
        verifier: Option<Arc<dyn IntentVerifier>>,
    ) -> &mut Self {
        self.specs.insert(
            kind,
            IntentSpec {
                kind,
                schema: schema_for(kind),
                danger_level,
                required_permission: permission_key(kind),
                allowed_in_emergency,
                executor,
                verifier,
            },
        );
        self
    }

    #[must_use]
    pub fn spec(&self, kind: IntentKind) -> Option<&IntentSpec> {
        self.specs.get(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// The built-in parameter schemas, one per kind.
#[must_use]
pub fn schema_for(kind: IntentKind) -> ParamSchema {
    let fields = match kind {
        IntentKind::Arm
        | IntentKind::Disarm
        | IntentKind::Halt
        | IntentKind::Resume
        | IntentKind::RunReconcile => Vec::new(),
        IntentKind::Flatten => vec![
            FieldSpec::optional("venue", FieldType::String),
            FieldSpec::optional("symbol", FieldType::String),
        ],
        IntentKind::SetMode => vec![FieldSpec::required("mode", FieldType::String)
            .with_allowed(&["paper", "shadow", "live"])],
        IntentKind::ThrottlePhase => vec![
            FieldSpec::required("phase", FieldType::String)
                .with_allowed(&["phase1", "phase2", "phase3"]),
            FieldSpec::required("pct", FieldType::Integer).with_range(0.0, 100.0),
        ],
        IntentKind::OverrideRisk => vec![
            FieldSpec::required("key", FieldType::String),
            FieldSpec::required("value", FieldType::Any),
        ],
        IntentKind::ApplyProposal => vec![
            FieldSpec::required("proposal_id", FieldType::String),
            FieldSpec::required("allocation", FieldType::Object),
        ],
        IntentKind::RollbackConfig => vec![FieldSpec::required("key", FieldType::String)],
    };
    ParamSchema { fields }
}
