// src/ingest/retry.rs
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Pause between ingestion attempts. Defaults to a fixed 500 ms, retried
/// forever; the feed limits how often a client may reconnect per minute.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Total attempts allowed; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            multiplier: 1.0,
            max_delay_ms: 30_000,
            jitter_ms: 0,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay_ms: delay.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Delay without jitter after `failures` consecutive failed attempts (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(64) as i32;
        let scaled = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exp);
        let cap = self.max_delay_ms.max(self.base_delay_ms) as f64;
        Duration::from_millis(scaled.min(cap) as u64)
    }

    pub fn delay_for(&self, failures: u32) -> Duration {
        let base = self.backoff(failures);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=self.jitter_ms);
        base.saturating_add(Duration::from_millis(jitter))
    }

    pub fn allows_another(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_half_second() {
        let p = RetryPolicy::default();
        for n in [1, 2, 10, 1000] {
            assert_eq!(p.delay_for(n), Duration::from_millis(500));
        }
        assert!(p.allows_another(u32::MAX - 1));
    }

    #[test]
    fn exponential_growth_is_capped() {
        let p = RetryPolicy {
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 3_000,
            ..RetryPolicy::default()
        };
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1_000));
        assert_eq!(p.backoff(3), Duration::from_millis(2_000));
        assert_eq!(p.backoff(4), Duration::from_millis(3_000));
        assert_eq!(p.backoff(500), Duration::from_millis(3_000));
    }

    #[test]
    fn jitter_stays_in_range() {
        let p = RetryPolicy {
            jitter_ms: 100,
            ..RetryPolicy::default()
        };
        for _ in 0..200 {
            let d = p.delay_for(1);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(600));
        }
    }

    #[test]
    fn attempt_cap() {
        let p = RetryPolicy {
            max_attempts: Some(3),
            ..RetryPolicy::default()
        };
        assert!(p.allows_another(2));
        assert!(!p.allows_another(3));
    }
}
