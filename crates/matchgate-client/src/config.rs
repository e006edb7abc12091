//! Client configuration.

use std::time::Duration;

/// Settings for an [`AuthenticatedConnection`](crate::AuthenticatedConnection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long opening the transport may take, handshake included, before
    /// the attempt counts as not established.
    ///
    /// Default: 5 seconds.
    pub connect_timeout: Duration,

    /// How long a requested close waits for the peer to acknowledge before
    /// the session is treated as closed anyway.
    ///
    /// Default: 5 seconds.
    pub close_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionConfig {
    /// Sets [`connect_timeout`](Self::connect_timeout).
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets [`close_timeout`](Self::close_timeout).
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.close_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_setters() {
        let config = ConnectionConfig::default()
            .with_connect_timeout(Duration::from_millis(20))
            .with_close_timeout(Duration::from_millis(30));
        assert_eq!(config.connect_timeout, Duration::from_millis(20));
        assert_eq!(config.close_timeout, Duration::from_millis(30));
    }
}
