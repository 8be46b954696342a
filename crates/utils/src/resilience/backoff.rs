//! Exponential backoff with signed jitter.

use rand::Rng;
use std::time::Duration;

/// Default base delay for exponential backoff (100ms)
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay for exponential backoff (10s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Delay schedule applied before each retry attempt.
///
/// The delay before attempt `n` (with `n >= 1`) is `base * 2^n` capped at
/// `max_delay`, plus a jitter drawn uniformly from `[-base, +base]`. The
/// result never goes below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Base delay, also the jitter amplitude
    pub base_delay: Duration,
    /// Maximum exponential component
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with the given base and cap
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Exponential component for `attempt`, without jitter
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before `attempt`, with jitter drawn from the thread-local RNG
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Delay before `attempt`, with jitter drawn from `rng`
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let backoff = self.exponential_delay(attempt).as_secs_f64();
        let base = self.base_delay.as_secs_f64();
        if base == 0.0 {
            return Duration::from_secs_f64(backoff);
        }

        let jitter = rng.gen_range(-base..=base);
        Duration::from_secs_f64((backoff + jitter).max(0.0))
    }
}
