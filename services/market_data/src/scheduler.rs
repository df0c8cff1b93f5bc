//! Warm-up and background-enhancement scheduling.
//!
//! Warm-up populates the critical `(symbol, timeframe)` set to a minimum
//! bar count under a hard deadline, with bounded parallelism and per-key
//! fixed-delay retries. Whatever is still unmet when the deadline lands is
//! reported, never silently treated as ready.
//!
//! Enhancement widens coverage afterwards at low priority: keys are queued
//! idempotently, fetched one at a time between pacing ticks, retried with
//! per-key exponential backoff, and marked degraded in the store once
//! retries run out.

use crate::error::{FeedError, Result};
use crate::gateway::{DataFeedGateway, GatewayLimiter};
use crate::retry::RetryPolicy;
use crate::store::CandleStore;
use chrono::Utc;
use config::{CoverageEntry, EnhancementConfig, GatewayConfig, WarmupConfig};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{SeriesKey, Symbol, Timeframe};

/// One critical-set requirement for warm-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRequirement {
    pub key: SeriesKey,
    pub min_bars: usize,
}

impl CoverageRequirement {
    pub fn new(symbol: impl Into<Symbol>, timeframe: Timeframe, min_bars: usize) -> Self {
        Self {
            key: SeriesKey::new(symbol, timeframe),
            min_bars,
        }
    }
}

impl From<&CoverageEntry> for CoverageRequirement {
    fn from(entry: &CoverageEntry) -> Self {
        Self::new(entry.symbol.as_str(), entry.timeframe, entry.bars)
    }
}

/// Why a critical key missed its warm-up requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmetReason {
    /// Still in flight (or never scheduled) when the deadline expired.
    DeadlineExpired,
    /// Feed does not know the symbol; key is permanently excluded.
    InvalidSymbol,
    /// Per-key retries exhausted on recoverable errors.
    RetriesExhausted,
}

/// A critical key that warm-up could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetCoverage {
    pub key: SeriesKey,
    pub bars_present: usize,
    pub reason: UnmetReason,
}

/// Partial-readiness result of `ensure_minimum_coverage`.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub ready: Vec<SeriesKey>,
    pub unmet: Vec<UnmetCoverage>,
    pub elapsed: Duration,
}

impl CoverageReport {
    pub fn fully_ready(&self) -> bool {
        self.unmet.is_empty()
    }
}

/// Target bars for a queued enhancement key.
type PendingTarget = usize;

/// Schedules warm-up fetches and the background enhancement loop over one
/// shared gateway budget.
pub struct WarmupEnhancementScheduler {
    store: Arc<CandleStore>,
    gateway: Arc<dyn DataFeedGateway>,
    limiter: Arc<GatewayLimiter>,
    warmup: WarmupConfig,
    enhancement: EnhancementConfig,
    gateway_cfg: GatewayConfig,
    /// Keys queued or in flight for enhancement; presence makes re-enqueue
    /// a no-op.
    pending: DashMap<SeriesKey, PendingTarget>,
    /// Keys permanently excluded after `InvalidSymbol`.
    excluded: DashMap<SeriesKey, ()>,
    queue_tx: mpsc::UnboundedSender<SeriesKey>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<SeriesKey>>>,
    degraded_tx: broadcast::Sender<(SeriesKey, f64)>,
}

impl WarmupEnhancementScheduler {
    pub fn new(
        store: Arc<CandleStore>,
        gateway: Arc<dyn DataFeedGateway>,
        warmup: WarmupConfig,
        enhancement: EnhancementConfig,
        gateway_cfg: GatewayConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (degraded_tx, _) = broadcast::channel(64);
        let limiter = Arc::new(GatewayLimiter::new(gateway_cfg.rate_limit_per_sec));
        Self {
            store,
            gateway,
            limiter,
            warmup,
            enhancement,
            gateway_cfg,
            pending: DashMap::new(),
            excluded: DashMap::new(),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            degraded_tx,
        }
    }

    /// Keys marked degraded by the enhancement loop, with their
    /// completeness ratio at the time.
    pub fn subscribe_degraded(&self) -> broadcast::Receiver<(SeriesKey, f64)> {
        self.degraded_tx.subscribe()
    }

    /// Synchronously bring every key in `critical` up to its minimum bar
    /// count, or report what is still unmet when `deadline` elapses —
    /// whichever comes first.
    pub async fn ensure_minimum_coverage(
        &self,
        critical: &[CoverageRequirement],
        deadline: Duration,
    ) -> CoverageReport {
        let started = Instant::now();
        info!(
            keys = critical.len(),
            deadline_ms = deadline.as_millis() as u64,
            parallelism = self.warmup.parallelism,
            "warm-up started"
        );

        let mut ready: Vec<SeriesKey> = Vec::new();
        let mut unmet: Vec<UnmetCoverage> = Vec::new();
        let semaphore = Arc::new(Semaphore::new(self.warmup.parallelism));
        let mut tasks: JoinSet<(SeriesKey, std::result::Result<usize, UnmetCoverage>)> =
            JoinSet::new();

        for req in critical {
            if self.excluded.contains_key(&req.key) {
                unmet.push(UnmetCoverage {
                    key: req.key.clone(),
                    bars_present: self.store.coverage(&req.key),
                    reason: UnmetReason::InvalidSymbol,
                });
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let gateway = Arc::clone(&self.gateway);
            let limiter = Arc::clone(&self.limiter);
            let policy = RetryPolicy::fixed(self.warmup.retry_attempts, self.warmup.retry_delay());
            let fetch_timeout = self.gateway_cfg.fetch_timeout();
            let req = req.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                let outcome =
                    warmup_fetch(&store, &*gateway, &limiter, &policy, &req, fetch_timeout).await;
                (req.key, outcome)
            });
        }

        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((key, Ok(bars))) => {
                        debug!(key = %key, bars, "warm-up key ready");
                        ready.push(key);
                    }
                    Ok((_, Err(miss))) => {
                        warn!(key = %miss.key, reason = ?miss.reason, "warm-up key unmet");
                        unmet.push(miss);
                    }
                    Err(join_err) if join_err.is_cancelled() => {}
                    Err(join_err) => {
                        warn!(error = %join_err, "warm-up task panicked");
                    }
                }
            }
        };

        if tokio::time::timeout(deadline, collect).await.is_err() {
            tasks.abort_all();
            let accounted: HashSet<SeriesKey> =
                ready.iter().cloned().chain(unmet.iter().map(|u| u.key.clone())).collect();
            for req in critical {
                if !accounted.contains(&req.key) {
                    unmet.push(UnmetCoverage {
                        key: req.key.clone(),
                        bars_present: self.store.coverage(&req.key),
                        reason: UnmetReason::DeadlineExpired,
                    });
                }
            }
        }

        // Excluded keys recorded before spawning may also have raced in via
        // a task; keep one entry per key.
        unmet.dedup_by(|a, b| a.key == b.key);

        let report = CoverageReport {
            ready,
            unmet,
            elapsed: started.elapsed(),
        };
        info!(
            ready = report.ready.len(),
            unmet = report.unmet.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "warm-up finished"
        );
        report
    }

    /// Queue a key for background enhancement. Non-blocking; re-enqueuing a
    /// key that is already pending (queued or in flight) is a no-op, as is
    /// enqueuing a permanently excluded key. Returns whether the key was
    /// newly queued.
    pub fn enqueue_enhancement(
        &self,
        symbol: impl Into<Symbol>,
        timeframe: Timeframe,
        target_bars: usize,
    ) -> bool {
        let key = SeriesKey::new(symbol, timeframe);
        if self.excluded.contains_key(&key) {
            debug!(key = %key, "enhancement skipped: excluded symbol");
            return false;
        }
        match self.pending.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(key = %key, "enhancement already pending");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(target_bars);
                // Receiver can only be gone after shutdown; dropping the key
                // then is correct.
                let _ = self.queue_tx.send(key);
                true
            }
        }
    }

    /// Number of keys currently queued or in flight.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Low-priority enhancement loop. Runs until cancelled; processes one
    /// key per pacing tick so analytical and execution work always see an
    /// idle gateway between fetches. Panics if called twice.
    pub async fn run_enhancement(&self, cancel: CancellationToken) {
        let mut queue_rx = self
            .queue_rx
            .lock()
            .take()
            .expect("enhancement loop started twice");
        info!("enhancement loop started");

        loop {
            let key = tokio::select! {
                _ = cancel.cancelled() => break,
                received = queue_rx.recv() => match received {
                    Some(key) => key,
                    None => break,
                },
            };

            let Some(target) = self.pending.get(&key).map(|entry| *entry.value()) else {
                continue;
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    // Leave the key pending; a restarted loop picks it up
                    // from a fresh enqueue.
                    break;
                }
                _ = self.enhance_key(&key, target) => {}
            }
            self.pending.remove(&key);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.enhancement.tick_interval()) => {}
            }
        }
        info!("enhancement loop stopped");
    }

    async fn enhance_key(&self, key: &SeriesKey, target_bars: usize) {
        let policy = RetryPolicy::exponential(
            self.enhancement.max_retries,
            Duration::from_millis(self.enhancement.backoff_base_ms),
            Duration::from_millis(self.enhancement.backoff_max_ms),
        );
        let req = CoverageRequirement {
            key: key.clone(),
            min_bars: target_bars,
        };
        let outcome = warmup_fetch(
            &self.store,
            &*self.gateway,
            &self.limiter,
            &policy,
            &req,
            self.gateway_cfg.fetch_timeout(),
        )
        .await;

        match outcome {
            Ok(bars) => {
                debug!(key = %key, bars, target_bars, "enhancement complete");
            }
            Err(miss) if miss.reason == UnmetReason::InvalidSymbol => {
                self.excluded.insert(key.clone(), ());
                warn!(key = %key, "enhancement excluded invalid symbol");
            }
            Err(miss) => {
                let ratio = self.store.mark_degraded(key).unwrap_or(0.0);
                let _ = self.degraded_tx.send((key.clone(), ratio));
                warn!(
                    key = %key,
                    bars_present = miss.bars_present,
                    target_bars,
                    "enhancement retries exhausted, key degraded"
                );
            }
        }
    }
}

/// Fetch-commit-verify cycle for one key under a retry policy. The request
/// window widens with each attempt so short gateway histories still
/// converge on the requirement.
async fn warmup_fetch(
    store: &CandleStore,
    gateway: &dyn DataFeedGateway,
    limiter: &GatewayLimiter,
    policy: &RetryPolicy,
    req: &CoverageRequirement,
    fetch_timeout: Duration,
) -> std::result::Result<usize, UnmetCoverage> {
    let key = &req.key;
    let outcome: Result<usize> = policy
        .run(|attempt| async move {
            limiter.acquire().await;

            let step = key.timeframe.duration();
            let window_bars = (req.min_bars.max(1) as i32) * 2 * attempt as i32;
            let to = Utc::now();
            let from = to - step * window_bars;

            let bars = tokio::time::timeout(
                fetch_timeout,
                gateway.fetch_candles(&key.symbol, key.timeframe, from, to),
            )
            .await
            .map_err(|_| FeedError::Timeout {
                timeout_ms: fetch_timeout.as_millis() as u64,
            })??;

            store.commit(key, bars)?;
            let present = store.coverage(key);
            if present >= req.min_bars {
                Ok(present)
            } else {
                Err(FeedError::DataUnavailable {
                    key: key.clone(),
                    bars_present: present,
                    bars_needed: req.min_bars,
                })
            }
        })
        .await;

    outcome.map_err(|err| UnmetCoverage {
        key: key.clone(),
        bars_present: store.coverage(key),
        reason: if err.is_permanent() {
            UnmetReason::InvalidSymbol
        } else {
            UnmetReason::RetriesExhausted
        },
    })
}
