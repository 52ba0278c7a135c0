//! Retry backoff for delivery and inbox workers (spec §4.3): exponential
//! with a cap, plus random jitter so a burst of items queued at the same
//! moment doesn't retry against one remote host in lockstep.

use std::time::Duration;

use rand::Rng;
use tootik_common::config::FederationConfig;

/// A multiplicative backoff schedule with jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl BackoffConfig {
    /// Build the schedule from the instance's federation configuration
    /// (spec §6 `delivery_retry_interval`/`delivery_max_attempts`).
    #[must_use]
    pub fn from_federation_config(config: &FederationConfig) -> Self {
        Self {
            max_attempts: config.delivery_max_attempts,
            initial_delay: config.delivery_retry_interval,
            max_delay: Duration::from_secs(6 * 60 * 60),
            multiplier: 2.0,
        }
    }

    /// Delay before the attempt numbered `attempts` (1-based: the delay
    /// before the first retry, after the first failure), with jitter in
    /// `[0.5x, 1.5x)` applied to the capped exponential value.
    #[must_use]
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_secs_f64((capped * jitter).max(0.0))
    }

    /// Whether another attempt should be scheduled after `attempts` failures.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::from_federation_config(&FederationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let backoff = BackoffConfig { max_attempts: 16, initial_delay: Duration::from_secs(30), max_delay: Duration::from_secs(3600), multiplier: 2.0 };
        let first = backoff.delay_for_attempt(1);
        let tenth = backoff.delay_for_attempt(10);
        assert!(first.as_secs_f64() <= 45.0);
        assert!(tenth.as_secs_f64() <= 3600.0 * 1.5);
    }

    #[test]
    fn stops_retrying_past_max_attempts() {
        let backoff = BackoffConfig::default();
        assert!(backoff.should_retry(0));
        assert!(!backoff.should_retry(backoff.max_attempts));
    }
}
