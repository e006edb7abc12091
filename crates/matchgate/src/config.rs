//! Server configuration.

use std::time::Duration;

/// Timing settings for a [`MatchServer`](crate::MatchServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a new connection has to send its token frame.
    pub handshake_timeout: Duration,
    /// Time between match passes.
    pub match_interval: Duration,
    /// How long a session may wait unmatched before it gets the cancel
    /// payload and is dropped from the pool.
    pub max_wait: Duration,
    /// Random delay (0..max) added before the first match pass.
    pub initial_jitter: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            match_interval: Duration::from_millis(250),
            max_wait: Duration::from_secs(30),
            initial_jitter: Duration::from_millis(50),
        }
    }
}

impl ServerConfig {
    /// Shortest allowed match interval.
    pub const MIN_MATCH_INTERVAL: Duration = Duration::from_millis(1);

    /// Sets [`handshake_timeout`](Self::handshake_timeout).
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets [`match_interval`](Self::match_interval).
    #[must_use]
    pub fn with_match_interval(mut self, interval: Duration) -> Self {
        self.match_interval = interval;
        self
    }

    /// Sets [`max_wait`](Self::max_wait).
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets [`initial_jitter`](Self::initial_jitter).
    #[must_use]
    pub fn with_initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by the server builder. `match_interval` is raised to
    /// [`Self::MIN_MATCH_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.match_interval < Self::MIN_MATCH_INTERVAL {
            tracing::warn!(
                interval = ?self.match_interval,
                "match_interval too small, clamping"
            );
            self.match_interval = Self::MIN_MATCH_INTERVAL;
        }
        self
    }

    /// `max_wait` in the millisecond unit the pool uses.
    pub(crate) fn max_wait_ms(&self) -> u64 {
        u64::try_from(self.max_wait.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.max_wait, Duration::from_secs(30));
        assert_eq!(config.max_wait_ms(), 30_000);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ServerConfig::default()
            .with_match_interval(Duration::ZERO)
            .validated();
        assert_eq!(config.match_interval, ServerConfig::MIN_MATCH_INTERVAL);
    }

    #[test]
    fn test_valid_interval_is_kept() {
        let config = ServerConfig::default()
            .with_match_interval(Duration::from_millis(20))
            .validated();
        assert_eq!(config.match_interval, Duration::from_millis(20));
    }
}
