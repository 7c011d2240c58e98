//! Engine configuration.

use std::time::Duration;

/// Configuration for the ingestion engine.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Total transaction attempts per batch under transient contention
    /// (the first attempt included).
    pub max_retry_attempts: u32,

    /// Fixed backoff between attempts.
    pub retry_backoff: Duration,

    /// SQLite busy timeout applied to the connection; contention beyond it
    /// surfaces as a transient error and enters the retry loop.
    pub busy_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            busy_timeout: Duration::from_secs(1),
        }
    }
}

impl IngestConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total attempt count.
    #[must_use]
    pub const fn max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Sets the backoff between attempts.
    #[must_use]
    pub const fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the connection busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(200));
    }

    #[test]
    fn builder_pattern() {
        let config = IngestConfig::new()
            .max_retry_attempts(5)
            .retry_backoff(Duration::from_millis(50));
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.retry_backoff, Duration::from_millis(50));
    }
}
