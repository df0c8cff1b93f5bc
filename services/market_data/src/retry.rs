//! Unified retry/backoff policy for gateway calls.
//!
//! Every gateway-facing call site (warm-up fetches, enhancement fetches,
//! order submission) goes through this one abstraction instead of
//! hand-rolling its own loop. Error types opt in by implementing
//! `Retryable`; a non-retryable error short-circuits immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Classifies whether an error is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry policy with fixed or exponential backoff and optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// Fixed-delay profile: `attempts` tries, `delay` between each.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            base_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Exponential profile doubling from `base` up to `max`, with jitter.
    pub fn exponential(attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts: attempts.max(1),
            base_delay: base,
            max_delay: max.max(base),
            multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before attempt `attempt + 1` (0-based count of failures so
    /// far). Monotonically non-decreasing, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let raw = self.base_delay.as_millis() as f64 * factor;
        let capped = raw.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        // +/- 20% spread keeps retries from synchronizing across keys.
        let spread = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((delay.as_millis() as f64 * spread) as u64)
    }

    /// Run `op` until it succeeds, errors permanently, or attempts run out.
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> std::result::Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.jittered(self.delay_for(attempt - 1));
                    debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
