//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for a Synapse process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Whether to emit JSON lines (for log shippers) instead of
    /// human-readable output.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "synapse-control".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build configuration from `SYNAPSE_*` environment variables,
    /// falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: env::var("SYNAPSE_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: env::var("SYNAPSE_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: env::var("SYNAPSE_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.json_logs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "synapse-control");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }
}
