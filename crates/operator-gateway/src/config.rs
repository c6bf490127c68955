//! Gateway configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// HTTP server tuning.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
    /// Whether to install a permissive CORS layer (operator consoles run
    /// on separate origins in development).
    pub permissive_cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7341".parse().expect("static addr parses"),
            request_timeout: Duration::from_secs(10),
            body_limit: 256 * 1024,
            permissive_cors: true,
        }
    }
}

impl GatewayConfig {
    /// Sanity-check the configuration before serving.
    ///
    /// # Errors
    ///
    /// A human-readable description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout < Duration::from_millis(100) {
            return Err("request_timeout below 100ms".to_string());
        }
        if self.body_limit < 1024 {
            return Err("body_limit below 1KiB".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_tiny_timeout() {
        let config = GatewayConfig {
            request_timeout: Duration::from_millis(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
