//! Exponential backoff with jitter, used by the capture runner's restart
//! policy (spec §4.1: "exponential from 1s, capped at 60s, reset on
//! successful liveness >= 30s").

use std::time::Duration;

/// Backoff configuration for subprocess restarts.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

/// Tracks the current backoff delay across repeated failures and resets
/// once the caller reports a sustained-healthy period.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next restart attempt, incrementing the
    /// internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.config.multiplier.powi(self.attempt as i32);
        self.attempt = self.attempt.saturating_add(1);

        let base_ms = self.config.base_delay.as_millis() as f64 * exp;
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = capped_ms * self.config.jitter_fraction * (rand::random::<f64>() - 0.5) * 2.0;
        let with_jitter = (capped_ms + jitter).max(0.0);

        Duration::from_millis(with_jitter as u64)
    }

    /// Called when the supervised process has been alive long enough that
    /// the failure streak should no longer influence the next restart.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
