//! # Wire-Stable Subjects
//!
//! Subject names are part of the platform's wire contract. Versioned
//! segments (`v1`) change only with the payload schema.

/// Halt command consumed by every execution-adjacent subsystem.
pub const SYS_HALT: &str = "cmd.sys.halt.v1";

/// Mirror of every audit append.
pub const AUDIT_OPERATOR: &str = "evt.audit.operator.v1";

/// Emitted after every config override / rollback / preset application.
pub const CONFIG_CHANGED: &str = "evt.config.changed.v1";

/// Emitted on every breaker trip and reset.
pub const BREAKER_TRIP: &str = "evt.breaker.trip.v1";

/// Pattern matching fills from any venue.
pub const FILL_PATTERN: &str = "evt.execution.fill.v1.*";

/// Outbound order placement subject for a venue/account/symbol triple.
#[must_use]
pub fn exec_place(venue: &str, account: &str, symbol: &str) -> String {
    format!("cmd.execution.place.v1.{venue}.{account}.{symbol}")
}

/// Inbound fill subject for a venue.
#[must_use]
pub fn exec_fill(venue: &str) -> String {
    format!("evt.execution.fill.v1.{venue}")
}

/// Dead-letter subject for a component.
#[must_use]
pub fn dlq(component: &str) -> String {
    format!("dlq.{component}")
}

/// Match a subject against a pattern.
///
/// Tokens are dot-separated; `*` matches exactly one token and `>` matches
/// one or more trailing tokens.
#[must_use]
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pat = pattern.split('.');
    let mut sub = subject.split('.');

    loop {
        match (pat.next(), sub.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(subject_matches(SYS_HALT, "cmd.sys.halt.v1"));
        assert!(!subject_matches(SYS_HALT, "cmd.sys.halt.v2"));
    }

    #[test]
    fn test_single_token_wildcard() {
        assert!(subject_matches(FILL_PATTERN, "evt.execution.fill.v1.deribit"));
        assert!(!subject_matches(
            FILL_PATTERN,
            "evt.execution.fill.v1.deribit.btc"
        ));
        assert!(!subject_matches(FILL_PATTERN, "evt.execution.fill.v1"));
    }

    #[test]
    fn test_tail_wildcard() {
        assert!(subject_matches("dlq.>", "dlq.state-manager"));
        assert!(subject_matches("cmd.execution.place.v1.>", &exec_place("dr", "a1", "BTC-PERP")));
        assert!(!subject_matches("dlq.>", "dlq"));
    }

    #[test]
    fn test_subject_builders() {
        assert_eq!(
            exec_place("deribit", "main", "BTC-PERP"),
            "cmd.execution.place.v1.deribit.main.BTC-PERP"
        );
        assert_eq!(exec_fill("binance"), "evt.execution.fill.v1.binance");
        assert_eq!(dlq("intent-service"), "dlq.intent-service");
    }
}
