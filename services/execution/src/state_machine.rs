//! The order execution state machine.
//!
//! Every accepted signal is wrapped in a `SignalExecution` guarded by its
//! own async mutex: transitions for one signal are strictly sequential, and
//! nothing outside this module can write lifecycle state. All state changes
//! go through the `SignalState::can_transition_to` table and are recorded
//! in the transition history and on the event stream.

use crate::error::{ExecutionError, GatewayError};
use crate::gateway::{ExecutionGateway, FillState, OrderRequest};
use crate::sizer::DynamicRiskSizer;
use crate::validator::SignalValidator;
use chrono::{DateTime, Utc};
use config::{CloseOutMode, ExecutionConfig};
use dashmap::DashMap;
use market_data::RetryPolicy;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use strategies::TraderMemoryStore;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};
use types::{
    AccountHealthSnapshot, Direction, EngineEvent, HaltReason, HaltState, RejectReason, SignalId,
    SignalState, TradingSignal,
};

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub from: SignalState,
    pub to: SignalState,
    pub reason: Option<RejectReason>,
    pub at: DateTime<Utc>,
}

/// Mutable lifecycle of one signal. Private to the state machine.
struct SignalExecution {
    signal: TradingSignal,
    state: SignalState,
    size: Option<Decimal>,
    order_id: Option<String>,
    transitions: Vec<TransitionRecord>,
}

impl SignalExecution {
    fn new(signal: TradingSignal) -> Self {
        Self {
            signal,
            state: SignalState::PendingValidation,
            size: None,
            order_id: None,
            transitions: Vec::new(),
        }
    }
}

/// Read-only view of an execution for consumers.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub signal: TradingSignal,
    pub state: SignalState,
    pub size: Option<Decimal>,
    pub order_id: Option<String>,
}

pub struct ExecutionStateMachine {
    executions: DashMap<SignalId, Arc<Mutex<SignalExecution>>>,
    validator: SignalValidator,
    sizer: DynamicRiskSizer,
    gateway: Arc<dyn ExecutionGateway>,
    memory: Arc<TraderMemoryStore>,
    halt_rx: watch::Receiver<HaltState>,
    health_rx: watch::Receiver<AccountHealthSnapshot>,
    config: ExecutionConfig,
    events: broadcast::Sender<EngineEvent>,
}

impl ExecutionStateMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        validator: SignalValidator,
        sizer: DynamicRiskSizer,
        gateway: Arc<dyn ExecutionGateway>,
        memory: Arc<TraderMemoryStore>,
        halt_rx: watch::Receiver<HaltState>,
        health_rx: watch::Receiver<AccountHealthSnapshot>,
        config: ExecutionConfig,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            executions: DashMap::new(),
            validator,
            sizer,
            gateway,
            memory,
            halt_rx,
            health_rx,
            config,
            events,
        }
    }

    /// Register a new signal in `PendingValidation`.
    pub fn admit(&self, signal: TradingSignal) -> SignalId {
        let id = signal.id;
        let _ = self.events.send(EngineEvent::SignalCreated {
            id,
            symbol: signal.symbol.to_string(),
            composite_confidence: signal.composite_confidence,
            at: Utc::now(),
        });
        info!(signal = %id, symbol = %signal.symbol, grade = %signal.grade, "signal admitted");
        self.executions
            .insert(id, Arc::new(Mutex::new(SignalExecution::new(signal))));
        id
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    fn execution(&self, id: SignalId) -> Result<Arc<Mutex<SignalExecution>>, ExecutionError> {
        self.executions
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(ExecutionError::UnknownSignal { id })
    }

    fn halt_state(&self) -> HaltState {
        *self.halt_rx.borrow()
    }

    fn health(&self) -> AccountHealthSnapshot {
        self.health_rx.borrow().clone()
    }

    /// The one mutation point: table-checked transition plus history and
    /// event emission.
    fn apply(
        &self,
        exec: &mut SignalExecution,
        to: SignalState,
        reason: Option<RejectReason>,
    ) -> Result<(), ExecutionError> {
        let from = exec.state;
        if !from.can_transition_to(to) {
            return Err(ExecutionError::IllegalTransition {
                id: exec.signal.id,
                from,
                to,
            });
        }
        exec.state = to;
        exec.transitions.push(TransitionRecord {
            from,
            to,
            reason,
            at: Utc::now(),
        });
        debug!(signal = %exec.signal.id, %from, %to, ?reason, "state transition");
        let _ = self.events.send(EngineEvent::SignalStateChanged {
            id: exec.signal.id,
            from,
            to,
            reason,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Drive a pending signal through validation, sizing, and submission.
    /// Holds the signal's mutex for the whole drive; concurrent callers for
    /// the same signal serialize here.
    pub async fn process(
        &self,
        id: SignalId,
        volatility_ratio: f64,
    ) -> Result<SignalState, ExecutionError> {
        let exec = self.execution(id)?;
        let mut guard = exec.lock().await;

        // Validation (the halt flag is the first rule checked).
        let halted = self.halt_state().is_halted();
        if let Err(reason) = self.validator.validate(&guard.signal, halted, &self.memory) {
            self.apply(&mut guard, SignalState::Rejected, Some(reason))?;
            warn!(signal = %id, %reason, "signal rejected at validation");
            return Err(ExecutionError::Validation { id, reason });
        }

        // Sizing.
        let health = self.health();
        let size = match self.sizer.size(&guard.signal, &health, volatility_ratio) {
            Ok(size) => size,
            Err(source) => {
                self.apply(
                    &mut guard,
                    SignalState::Rejected,
                    Some(RejectReason::SizingInfeasible),
                )?;
                warn!(signal = %id, error = %source, "signal rejected at sizing");
                return Err(ExecutionError::Sizing { id, source });
            }
        };
        guard.size = Some(size);
        self.apply(&mut guard, SignalState::Sized, None)?;

        // The halt flag is re-checked immediately before the outward
        // transition; a halt that landed during sizing cancels here.
        if let HaltState::Halted { reason, .. } = self.halt_state() {
            self.apply(
                &mut guard,
                SignalState::Cancelled,
                Some(RejectReason::HaltActive),
            )?;
            return Err(ExecutionError::Halted { id, reason });
        }

        self.apply(&mut guard, SignalState::Submitted, None)?;
        self.submit(&mut guard, size).await
    }

    async fn submit(
        &self,
        guard: &mut SignalExecution,
        size: Decimal,
    ) -> Result<SignalState, ExecutionError> {
        let id = guard.signal.id;
        let request = OrderRequest {
            signal_id: id,
            symbol: guard.signal.symbol.clone(),
            direction: guard.signal.direction,
            entry: guard.signal.entry,
            stop: guard.signal.stop,
            targets: guard.signal.targets.clone(),
            size,
        };

        let policy = RetryPolicy::exponential(
            self.config.submit_max_attempts,
            Duration::from_millis(self.config.submit_backoff_base_ms),
            Duration::from_millis(self.config.submit_backoff_max_ms),
        );
        let gateway = Arc::clone(&self.gateway);
        let submission = policy.run(|attempt| {
            let gateway = Arc::clone(&gateway);
            let request = request.clone();
            async move {
                debug!(signal = %id, attempt, "submitting order");
                gateway.submit_order(&request).await
            }
        });

        match tokio::time::timeout(self.config.submission_timeout(), submission).await {
            Ok(Ok(ack)) => {
                guard.order_id = Some(ack.order_id);
                self.apply(guard, SignalState::Acknowledged, None)?;
                info!(signal = %id, order_id = ?guard.order_id, "order acknowledged");
                Ok(SignalState::Acknowledged)
            }
            Ok(Err(source)) => {
                let reason = match &source {
                    GatewayError::Fatal { .. } => RejectReason::GatewayRejected,
                    GatewayError::Transient { .. } => RejectReason::SubmissionTimeout,
                };
                self.apply(guard, SignalState::Rejected, Some(reason))?;
                warn!(signal = %id, error = %source, "submission failed terminally");
                Err(ExecutionError::Gateway { id, source })
            }
            Err(_) => {
                // Not cancellable mid-flight; mark rejected and leave any
                // late acknowledgement to fill reconciliation.
                self.apply(
                    guard,
                    SignalState::Rejected,
                    Some(RejectReason::SubmissionTimeout),
                )?;
                warn!(signal = %id, "submission timed out, pending reconciliation");
                Err(ExecutionError::SubmissionTimeout {
                    id,
                    timeout_ms: self.config.submission_timeout_ms,
                })
            }
        }
    }

    /// Poll the gateway for fill progress on every acknowledged execution.
    pub async fn reconcile_fills(&self) {
        let targets: Vec<Arc<Mutex<SignalExecution>>> = self
            .executions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        for exec in targets {
            let mut guard = exec.lock().await;
            if !matches!(
                guard.state,
                SignalState::Acknowledged | SignalState::PartiallyFilled
            ) {
                continue;
            }
            let Some(order_id) = guard.order_id.clone() else {
                continue;
            };

            match self.gateway.query_fill(&order_id).await {
                Ok(report) => {
                    let result = match (guard.state, report.state) {
                        (_, FillState::Filled) => self.apply(&mut guard, SignalState::Filled, None),
                        (SignalState::Acknowledged, FillState::PartiallyFilled) => {
                            self.apply(&mut guard, SignalState::PartiallyFilled, None)
                        }
                        (_, FillState::Rejected | FillState::Cancelled) => self.apply(
                            &mut guard,
                            SignalState::Cancelled,
                            Some(RejectReason::GatewayRejected),
                        ),
                        _ => Ok(()),
                    };
                    if let Err(err) = result {
                        warn!(order_id, error = %err, "fill reconciliation transition failed");
                    }
                }
                Err(err) => {
                    debug!(order_id, error = %err, "fill query failed, will retry next pass");
                }
            }
        }
    }

    /// Close a filled execution at `exit_price`, record the outcome for
    /// every contributing pattern key, and archive the signal.
    pub async fn close(
        &self,
        id: SignalId,
        exit_price: Decimal,
    ) -> Result<SignalState, ExecutionError> {
        let exec = self.execution(id)?;
        let mut guard = exec.lock().await;
        self.apply(&mut guard, SignalState::Closed, None)?;
        self.record_closure_outcomes(&guard.signal, exit_price);
        info!(signal = %id, %exit_price, "signal closed");
        Ok(SignalState::Closed)
    }

    fn record_closure_outcomes(&self, signal: &TradingSignal, exit_price: Decimal) {
        let success = match signal.direction {
            Direction::Long => exit_price > signal.entry,
            Direction::Short => exit_price < signal.entry,
        };
        for key in &signal.contributing_patterns {
            let record = self.memory.record_outcome(key, success);
            let _ = self.events.send(EngineEvent::OutcomeRecorded {
                pattern_key: key.clone(),
                success,
                success_rate: record.success_rate,
                sample_count: record.sample_count,
                at: Utc::now(),
            });
        }
    }

    /// Emergency-halt reaction: force every non-terminal execution to
    /// `Cancelled`, or run the configured close-out for filled positions.
    /// Returns how many executions were preempted.
    pub async fn halt_sweep(&self, reason: HaltReason) -> usize {
        let targets: Vec<Arc<Mutex<SignalExecution>>> = self
            .executions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        let mut affected = 0usize;
        for exec in targets {
            let mut guard = exec.lock().await;
            if guard.state.is_terminal() {
                continue;
            }

            if !guard.state.is_filled() {
                if let Err(err) = self.apply(
                    &mut guard,
                    SignalState::Cancelled,
                    Some(RejectReason::HaltActive),
                ) {
                    warn!(signal = %guard.signal.id, error = %err, "halt cancel failed");
                    continue;
                }
                affected += 1;
                continue;
            }

            match self.config.close_out_mode {
                CloseOutMode::HoldPosition => {
                    info!(
                        signal = %guard.signal.id,
                        %reason,
                        "halt: filled position held for operator"
                    );
                }
                CloseOutMode::ForceClose => {
                    let Some(order_id) = guard.order_id.clone() else {
                        continue;
                    };
                    match self.gateway.close_position(&order_id).await {
                        Ok(report) => {
                            let exit = report.price.unwrap_or(guard.signal.entry);
                            if self.apply(&mut guard, SignalState::Closed, None).is_ok() {
                                self.record_closure_outcomes(&guard.signal, exit);
                                affected += 1;
                            }
                        }
                        Err(err) => {
                            warn!(
                                signal = %guard.signal.id,
                                error = %err,
                                "halt close-out failed, position left open"
                            );
                        }
                    }
                }
            }
        }
        if affected > 0 {
            warn!(%reason, affected, "emergency halt swept executions");
        }
        affected
    }

    /// Current lifecycle view of every tracked signal.
    pub async fn current_signals(&self) -> Vec<SignalSnapshot> {
        let targets: Vec<Arc<Mutex<SignalExecution>>> = self
            .executions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        let mut out = Vec::with_capacity(targets.len());
        for exec in targets {
            let guard = exec.lock().await;
            out.push(SignalSnapshot {
                signal: guard.signal.clone(),
                state: guard.state,
                size: guard.size,
                order_id: guard.order_id.clone(),
            });
        }
        out
    }

    /// Transition history for one signal.
    pub async fn transition_history(
        &self,
        id: SignalId,
    ) -> Result<Vec<TransitionRecord>, ExecutionError> {
        let exec = self.execution(id)?;
        let guard = exec.lock().await;
        Ok(guard.transitions.clone())
    }

    /// Current state for one signal.
    pub async fn state_of(&self, id: SignalId) -> Result<SignalState, ExecutionError> {
        let exec = self.execution(id)?;
        let guard = exec.lock().await;
        Ok(guard.state)
    }
}
