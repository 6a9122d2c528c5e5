//! Retry policy with exponential backoff.

use std::time::Duration;

use trellis_shared::config::SagaConfig;

/// Bounded exponential backoff for transient step failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per step (forward or compensation) before giving up.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Ceiling on the delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy from configuration.
    #[must_use]
    pub fn from_config(config: &SagaConfig) -> Self {
        Self {
            max_attempts: config.max_step_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Returns the delay before retrying after `attempt` failures.
    ///
    /// `delay(1)` is the base delay, `delay(2)` twice that, and so on,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let multiplier = 2u64.saturating_pow(exponent);
        self.base_delay
            .saturating_mul(u32::try_from(multiplier.min(u64::from(u32::MAX))).unwrap_or(u32::MAX))
            .min(self.max_delay)
    }

    /// Returns true if another attempt is allowed after `attempt` failures.
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SagaConfig::default())
    }
}
