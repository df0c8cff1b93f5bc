//! Scripted account-health source for tests.

use crate::error::HealthSourceError;
use crate::supervisor::AccountHealthSource;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use types::AccountMetrics;

pub struct MockHealthSource {
    metrics: RwLock<AccountMetrics>,
    failures_remaining: AtomicU64,
}

impl MockHealthSource {
    pub fn new(metrics: AccountMetrics) -> Self {
        Self {
            metrics: RwLock::new(metrics),
            failures_remaining: AtomicU64::new(0),
        }
    }

    /// Replace the scripted metrics returned by subsequent fetches.
    pub fn set(&self, metrics: AccountMetrics) {
        *self.metrics.write() = metrics;
    }

    /// Fail the next `n` fetches.
    pub fn fail_next(&self, n: u64) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountHealthSource for MockHealthSource {
    async fn fetch(&self) -> Result<AccountMetrics, HealthSourceError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(HealthSourceError::Unavailable {
                reason: "scripted outage".into(),
            });
        }
        Ok(self.metrics.read().clone())
    }
}
