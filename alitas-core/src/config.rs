use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{GatewayError, Result};

/// Where the engine listens for submitted transactions.
pub const DEFAULT_PROXY_LISTEN: &str = "127.0.0.1:1338";

/// Where the application listens for delivery calls.
pub const DEFAULT_CLIENT_CONNECT: &str = "127.0.0.1:1339";

/// Settings shared by both sides of a socket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Engine's submission listener (host:port)
    pub proxy_listen: String,
    /// Application's delivery listener (host:port)
    pub client_connect: String,
    /// Upper bound on establishing a connection
    pub dial_timeout: Duration,
    /// Upper bound on a single call once connected; `None` waits forever
    pub call_timeout: Option<Duration>,
    /// Largest accepted frame in bytes
    pub max_message_size: usize,
    /// Capacity of the transaction hand-off queue; `None` is unbounded
    pub submit_queue_capacity: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            proxy_listen: DEFAULT_PROXY_LISTEN.to_string(),
            client_connect: DEFAULT_CLIENT_CONNECT.to_string(),
            dial_timeout: Duration::from_millis(1000),
            call_timeout: None,
            max_message_size: 16 * 1024 * 1024, // 16MB
            submit_queue_capacity: None,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy_listen(mut self, addr: impl Into<String>) -> Self {
        self.proxy_listen = addr.into();
        self
    }

    pub fn with_client_connect(mut self, addr: impl Into<String>) -> Self {
        self.client_connect = addr.into();
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_submit_queue_capacity(mut self, capacity: usize) -> Self {
        self.submit_queue_capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.proxy_listen.trim().is_empty() {
            return Err(GatewayError::config("proxy_listen address is empty"));
        }
        if self.client_connect.trim().is_empty() {
            return Err(GatewayError::config("client_connect address is empty"));
        }
        if self.dial_timeout.is_zero() {
            return Err(GatewayError::config("dial_timeout must be greater than zero"));
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(GatewayError::config("call_timeout must be greater than zero"));
        }
        if self.max_message_size == 0 {
            return Err(GatewayError::config("max_message_size must be greater than zero"));
        }
        if self.submit_queue_capacity == Some(0) {
            return Err(GatewayError::config(
                "submit_queue_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.proxy_listen, "127.0.0.1:1338");
        assert_eq!(config.client_connect, "127.0.0.1:1339");
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.submit_queue_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = GatewayConfig::new()
            .with_proxy_listen("0.0.0.0:9000")
            .with_client_connect("10.0.0.2:9001")
            .with_call_timeout(Duration::from_secs(5))
            .with_submit_queue_capacity(64);

        assert_eq!(config.proxy_listen, "0.0.0.0:9000");
        assert_eq!(config.client_connect, "10.0.0.2:9001");
        assert_eq!(config.call_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.submit_queue_capacity, Some(64));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(GatewayConfig::new().with_proxy_listen(" ").validate().is_err());
        assert!(GatewayConfig::new()
            .with_dial_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(GatewayConfig::new()
            .with_call_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(GatewayConfig::new()
            .with_submit_queue_capacity(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = GatewayConfig::new().with_call_timeout(Duration::from_millis(250));
        let json = serde_json::to_string(&config).unwrap();
        let decoded: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
