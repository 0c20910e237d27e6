//! Reconnect backoff
//!
//! Exponential backoff with full jitter for connection attempts that fail, and
//! a bounded random delay for the invalid-session path.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff state
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    /// Delay before the next attempt
    ///
    /// The ceiling doubles with every consecutive failure up to `max`; the
    /// returned delay is drawn uniformly from `[ceiling / 2, ceiling]`.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.failures = self.failures.saturating_add(1);
        random_between(ceiling / 2, ceiling)
    }

    /// Upper bound of the next delay
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        let factor = 1u32.checked_shl(self.failures.min(16)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// A session was established; start over from `base`
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Uniform random duration in `[min, max]` (millisecond resolution)
#[must_use]
pub fn random_between(min: Duration, max: Duration) -> Duration {
    let low = min.as_millis() as u64;
    let high = max.as_millis() as u64;

    if high <= low {
        return min;
    }

    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}
