//! Backoff schedule for re-issuing timed-out calls.
//!
//! A [`Backoff`] is created per `call` from the client's [`RetryConfig`] and
//! hands out one delay per permitted retry: exponentially growing, capped at
//! `max_delay` and jittered by ±25%. The client decides which failures are
//! worth another attempt; the schedule only decides how long to wait and
//! when to give up.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::time::Duration;

use crate::RetryConfig;

/// Remaining retries for one call.
#[derive(Debug)]
pub(crate) struct Backoff {
    // ---
    remaining: u32,
    base: Duration,
    multiplier: f64,
    cap: Duration,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            remaining: config.max_attempts,
            base: config.initial_delay,
            multiplier: f64::from(config.multiplier),
            cap: config.max_delay,
        }
    }

    /// Delay before the next attempt, or `None` once retries are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        // ---
        self.remaining = self.remaining.checked_sub(1)?;

        let delay = self.base;
        self.base = Duration::try_from_secs_f64(delay.as_secs_f64() * self.multiplier)
            .map_or(self.cap, |grown| grown.min(self.cap));
        Some(jitter(delay, RandomState::new().hash_one(self.remaining)))
    }
}

/// Scale `delay` by a factor in `0.75..=1.25` picked by `seed`.
fn jitter(delay: Duration, seed: u64) -> Duration {
    let per_mille = 750 + u128::from(seed % 501);
    let nanos = delay.as_nanos() * per_mille / 1000;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}
