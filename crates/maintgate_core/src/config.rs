//! Coordinator configuration.

use crate::error::{CoreError, CoreResult};
use crate::types::NodeRole;
use std::time::Duration;

/// Configuration for unblock retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Fixed delay between a failed unblock and the next attempt.
    pub delay: Duration,
    /// Give up after this many retries. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Caps the number of retries per table.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero delay or a zero attempt cap.
    pub fn validate(&self) -> CoreResult<()> {
        if self.delay.is_zero() {
            return Err(CoreError::invalid_config("retry delay must be non-zero"));
        }
        if self.max_attempts == Some(0) {
            return Err(CoreError::invalid_config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration for a [`crate::Coordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Role of this node. Only controllers clear stale blocks on start.
    pub role: NodeRole,

    /// Unblock retry behavior.
    pub retry: RetryConfig,

    /// Number of per-table signal latches.
    pub signal_stripes: usize,

    /// Whether shutdown makes a last attempt for pending retries.
    pub drain_on_shutdown: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::Worker,
            retry: RetryConfig::default(),
            signal_stripes: 64,
            drain_on_shutdown: true,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the node role.
    #[must_use]
    pub const fn role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the number of signal latches.
    #[must_use]
    pub const fn signal_stripes(mut self, stripes: usize) -> Self {
        self.signal_stripes = stripes;
        self
    }

    /// Sets whether shutdown drains pending retries.
    #[must_use]
    pub const fn drain_on_shutdown(mut self, value: bool) -> Self {
        self.drain_on_shutdown = value;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is out of range.
    pub fn validate(&self) -> CoreResult<()> {
        if self.signal_stripes == 0 {
            return Err(CoreError::invalid_config("signal_stripes must be at least 1"));
        }
        self.retry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.role, NodeRole::Worker);
        assert_eq!(config.retry.delay, Duration::from_secs(2));
        assert!(config.retry.max_attempts.is_none());
        assert!(config.drain_on_shutdown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = CoordinatorConfig::new()
            .role(NodeRole::Controller)
            .signal_stripes(8)
            .retry(RetryConfig::new().with_delay(Duration::from_millis(10)).with_max_attempts(3));

        assert_eq!(config.role, NodeRole::Controller);
        assert_eq!(config.signal_stripes, 8);
        assert_eq!(config.retry.delay, Duration::from_millis(10));
        assert_eq!(config.retry.max_attempts, Some(3));
    }

    #[test]
    fn zero_values_rejected() {
        assert!(CoordinatorConfig::new().signal_stripes(0).validate().is_err());
        assert!(RetryConfig::new().with_delay(Duration::ZERO).validate().is_err());
        assert!(RetryConfig::new().with_max_attempts(0).validate().is_err());
    }
}
