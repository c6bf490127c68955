//! # Role-Based Access Control
//!
//! Maps `(role, intent kind)` to allow/deny. The table is data, not code:
//! the runtime builds it from config, and `superadmin` bypasses every rule.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::IntentKind;

/// Operator roles, least privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Operator,
    Admin,
    Superadmin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Operator => "operator",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Parse a role from its wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "viewer" => Some(Role::Viewer),
            "operator" => Some(Role::Operator),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

/// The permission key reported to a denied caller.
#[must_use]
pub fn permission_key(kind: IntentKind) -> String {
    format!("intent:{kind}")
}

/// Allow/deny table consulted on every submission.
#[derive(Debug, Clone, Default)]
pub struct RbacTable {
    rules: HashMap<(Role, IntentKind), bool>,
}

impl RbacTable {
    /// Empty table: everything denied except superadmin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default production table.
    ///
    /// - `viewer`: nothing.
    /// - `operator`: day-to-day controls, no config mutation or halt.
    /// - `admin`: everything.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        let operator_kinds = [
            IntentKind::Arm,
            IntentKind::Disarm,
            IntentKind::SetMode,
            IntentKind::ThrottlePhase,
            IntentKind::Flatten,
            IntentKind::RunReconcile,
            IntentKind::Resume,
        ];
        for kind in operator_kinds {
            table.allow(Role::Operator, kind);
        }
        for kind in IntentKind::ALL {
            table.allow(Role::Admin, kind);
        }
        table
    }

    pub fn allow(&mut self, role: Role, kind: IntentKind) -> &mut Self {
        self.rules.insert((role, kind), true);
        self
    }

    pub fn deny(&mut self, role: Role, kind: IntentKind) -> &mut Self {
        self.rules.insert((role, kind), false);
        self
    }

    /// Whether `role` may submit `kind`. Superadmin bypasses the table.
    #[must_use]
    pub fn allows(&self, role: Role, kind: IntentKind) -> bool {
        if role == Role::Superadmin {
            return true;
        }
        self.rules.get(&(role, kind)).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superadmin_bypasses_table() {
        let table = RbacTable::new();
        for kind in IntentKind::ALL {
            assert!(table.allows(Role::Superadmin, kind));
        }
    }

    #[test]
    fn test_standard_table_operator_scope() {
        let table = RbacTable::standard();
        assert!(table.allows(Role::Operator, IntentKind::Arm));
        assert!(table.allows(Role::Operator, IntentKind::Flatten));
        assert!(!table.allows(Role::Operator, IntentKind::OverrideRisk));
        assert!(!table.allows(Role::Operator, IntentKind::Halt));
        assert!(!table.allows(Role::Viewer, IntentKind::Arm));
        assert!(table.allows(Role::Admin, IntentKind::Halt));
    }

    #[test]
    fn test_explicit_deny_wins_over_absent() {
        let mut table = RbacTable::standard();
        table.deny(Role::Operator, IntentKind::Arm);
        assert!(!table.allows(Role::Operator, IntentKind::Arm));
    }

    #[test]
    fn test_permission_key_format() {
        assert_eq!(permission_key(IntentKind::SetMode), "intent:SET_MODE");
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in [Role::Viewer, Role::Operator, Role::Admin, Role::Superadmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }
}
