//! Emergency-stop supervision loop.

use crate::error::{HealthSourceError, ResetError};
use async_trait::async_trait;
use chrono::Utc;
use config::EmergencyConfig;
use market_data::DataFeedGateway;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    AccountHealthSnapshot, AccountMetrics, EngineEvent, HaltReason, HaltState, HealthBand,
};

/// Broker-facing account metrics source (external collaborator).
#[async_trait]
pub trait AccountHealthSource: Send + Sync {
    async fn fetch(&self) -> Result<AccountMetrics, HealthSourceError>;
}

/// Fleet-wide circuit breaker: evaluates account and system health on a
/// fixed interval, publishes versioned snapshots, and owns the halt flag.
pub struct EmergencyStopSupervisor {
    source: Arc<dyn AccountHealthSource>,
    feed: Arc<dyn DataFeedGateway>,
    config: EmergencyConfig,
    health_tx: watch::Sender<AccountHealthSnapshot>,
    halt_tx: watch::Sender<HaltState>,
    /// High-water balance mark for drawdown computation.
    peak_balance: Mutex<Decimal>,
    /// When connectivity was first observed lost, for the grace window.
    connectivity_lost_since: Mutex<Option<Instant>>,
    /// Breach observed by the most recent evaluation; gates recovery.
    active_breach: Mutex<Option<HaltReason>>,
    events: broadcast::Sender<EngineEvent>,
}

impl EmergencyStopSupervisor {
    pub fn new(
        source: Arc<dyn AccountHealthSource>,
        feed: Arc<dyn DataFeedGateway>,
        config: EmergencyConfig,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let (health_tx, _) = watch::channel(AccountHealthSnapshot::startup());
        let (halt_tx, _) = watch::channel(HaltState::Clear);
        Self {
            source,
            feed,
            config,
            health_tx,
            halt_tx,
            peak_balance: Mutex::new(Decimal::ZERO),
            connectivity_lost_since: Mutex::new(None),
            active_breach: Mutex::new(None),
            events,
        }
    }

    /// Fresh reader of the health snapshot channel.
    pub fn health_receiver(&self) -> watch::Receiver<AccountHealthSnapshot> {
        self.health_tx.subscribe()
    }

    /// Fresh reader of the halt flag channel.
    pub fn halt_receiver(&self) -> watch::Receiver<HaltState> {
        self.halt_tx.subscribe()
    }

    pub fn current_health(&self) -> AccountHealthSnapshot {
        self.health_tx.borrow().clone()
    }

    pub fn halt_state(&self) -> HaltState {
        *self.halt_tx.borrow()
    }

    /// One evaluation pass: fetch metrics, compute the band, publish the
    /// snapshot, and trip the halt if any configured threshold is breached.
    pub async fn evaluate_once(&self) -> AccountHealthSnapshot {
        let previous = self.health_tx.borrow().clone();
        let (metrics, source_ok) = match self.source.fetch().await {
            Ok(metrics) => (metrics, true),
            Err(err) => {
                debug!(error = %err, "health source unavailable, reusing last metrics");
                (
                    AccountMetrics {
                        balance: previous.balance,
                        equity: previous.equity,
                        daily_loss: previous.daily_loss,
                        consecutive_losses: previous.consecutive_losses,
                    },
                    false,
                )
            }
        };

        let feed_ok = self.feed.connectivity().await;
        let connectivity_ok = source_ok && feed_ok;

        let drawdown_pct = {
            let mut peak = self.peak_balance.lock();
            if metrics.balance > *peak {
                *peak = metrics.balance;
            }
            if peak.is_zero() {
                0.0
            } else {
                ((*peak - metrics.equity) / *peak)
                    .to_f64()
                    .unwrap_or(0.0)
                    .max(0.0)
            }
        };

        let band = if drawdown_pct >= self.config.drawdown_critical_pct {
            HealthBand::Critical
        } else if drawdown_pct >= self.config.drawdown_warning_pct {
            HealthBand::Warning
        } else {
            HealthBand::Normal
        };

        let connectivity_breached = {
            let mut lost_since = self.connectivity_lost_since.lock();
            if connectivity_ok {
                *lost_since = None;
                false
            } else {
                let since = lost_since.get_or_insert_with(Instant::now);
                since.elapsed() >= self.config.connectivity_grace()
            }
        };

        let breach = if drawdown_pct >= self.config.drawdown_critical_pct {
            Some(HaltReason::DrawdownCritical)
        } else if metrics.consecutive_losses >= self.config.max_consecutive_losses {
            Some(HaltReason::ConsecutiveLossLimit)
        } else if metrics.daily_loss >= self.config.max_daily_loss {
            Some(HaltReason::DailyLossLimit)
        } else if connectivity_breached {
            Some(HaltReason::ConnectivityLost)
        } else {
            None
        };
        *self.active_breach.lock() = breach;

        if let Some(reason) = breach {
            if !self.halt_state().is_halted() {
                self.trip(reason);
            }
        }

        let snapshot = AccountHealthSnapshot {
            balance: metrics.balance,
            equity: metrics.equity,
            drawdown_pct,
            consecutive_losses: metrics.consecutive_losses,
            daily_loss: metrics.daily_loss,
            connectivity_ok,
            band,
            version: previous.version + 1,
            generated_at: Utc::now(),
        };
        self.health_tx.send_replace(snapshot.clone());
        snapshot
    }

    fn trip(&self, reason: HaltReason) {
        warn!(%reason, "EMERGENCY STOP tripped");
        self.halt_tx.send_replace(HaltState::Halted {
            reason,
            since: Utc::now(),
        });
        let _ = self.events.send(EngineEvent::EmergencyHalted {
            reason,
            at: Utc::now(),
        });
    }

    /// Operator-initiated halt; the only inbound command besides reset.
    pub fn force_emergency_stop(&self) {
        if !self.halt_state().is_halted() {
            self.trip(HaltReason::OperatorRequested);
        }
    }

    /// Explicit recovery. Refused while any trip condition was still
    /// breached on the most recent evaluation — there is no automatic or
    /// partial resume.
    pub fn reset_after_recovery(&self) -> Result<(), ResetError> {
        if !self.halt_state().is_halted() {
            return Err(ResetError::NotHalted);
        }
        if let Some(reason) = *self.active_breach.lock() {
            return Err(ResetError::ConditionStillBreached { reason });
        }
        self.halt_tx.send_replace(HaltState::Clear);
        let _ = self.events.send(EngineEvent::HaltCleared { at: Utc::now() });
        info!("emergency stop reset after recovery");
        Ok(())
    }

    /// Supervision loop on the configured interval, until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_ms = self.config.eval_interval_ms,
            "emergency stop supervisor started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.eval_interval()) => {
                    self.evaluate_once().await;
                }
            }
        }
        info!("emergency stop supervisor stopped");
    }
}
