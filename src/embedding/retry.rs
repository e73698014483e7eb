//! Bounded retry with exponential backoff and jitter.

use std::time::Duration;

use crate::types::EmbedderConfig;

/// Retry schedule for embedding calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.5, 1.0)
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EmbedderConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &EmbedderConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter: true,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay);

        if !self.jitter {
            return delay;
        }

        let jitter_factor = 0.5 + rand::random::<f64>() * 0.5;
        delay.mul_f64(jitter_factor)
    }
}
