//! Engine assembly, task supervision, and the consumer API.

use crate::counters::{CountersSnapshot, PerformanceCounters};
use crate::error::EngineError;
use crate::volatility::volatility_ratio;
use chrono::Utc;
use config::{DetectionConfig, EngineConfig};
use dashmap::DashMap;
use execution::{
    DynamicRiskSizer, ExecutionGateway, ExecutionStateMachine, SignalSnapshot, SignalValidator,
};
use market_data::{
    CandleStore, CoverageReport, CoverageRequirement, DataFeedGateway, WarmupEnhancementScheduler,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strategies::{
    ConfluenceConfidenceEngine, MemoryPayload, PatternDetectionPanel, TraderMemoryStore,
};
use supervisor::{AccountHealthSource, EmergencyStopSupervisor, ResetError};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    AccountHealthSnapshot, EngineEvent, HaltState, PersistedSnapshot, SeriesKey, SignalId,
    SignalState, SnapshotMeta, TradingSignal,
};

/// The assembled decision engine. Construction via `TradingEngine::start`
/// performs recovery and warm-up; background work runs in supervised tasks
/// until `shutdown`.
pub struct TradingEngine {
    config: EngineConfig,
    store: Arc<CandleStore>,
    scheduler: Arc<WarmupEnhancementScheduler>,
    memory: Arc<TraderMemoryStore>,
    machine: Arc<ExecutionStateMachine>,
    supervisor: Arc<EmergencyStopSupervisor>,
    panel: Arc<PatternDetectionPanel>,
    confluence: Arc<ConfluenceConfidenceEngine>,
    counters: Arc<PerformanceCounters>,
    events: broadcast::Sender<EngineEvent>,
    active_signatures: Arc<DashMap<String, SignalId>>,
    warmup_report: CoverageReport,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TradingEngine {
    /// Restore state, run the SLA-bounded warm-up, and spawn every
    /// background task.
    pub async fn start(
        config: EngineConfig,
        feed: Arc<dyn DataFeedGateway>,
        exec_gateway: Arc<dyn ExecutionGateway>,
        health_source: Arc<dyn AccountHealthSource>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let (events, _) = broadcast::channel(1024);

        // Trader memory re-hydrates before any signal is accepted.
        let memory = Arc::new(TraderMemoryStore::new(config.memory.window_capacity));
        if let Some(snapshot) = TraderMemoryStore::load_from(&config.memory.snapshot_path)? {
            memory.restore(snapshot)?;
        }

        let store = Arc::new(CandleStore::new());
        let scheduler = Arc::new(WarmupEnhancementScheduler::new(
            Arc::clone(&store),
            Arc::clone(&feed),
            config.warmup.clone(),
            config.enhancement.clone(),
            config.gateway.clone(),
        ));

        let supervisor = Arc::new(EmergencyStopSupervisor::new(
            health_source,
            Arc::clone(&feed),
            config.emergency.clone(),
            events.clone(),
        ));
        // Prime account health so the first sizing pass sees real numbers.
        supervisor.evaluate_once().await;

        let machine = Arc::new(ExecutionStateMachine::new(
            SignalValidator::new(&config.validation, &config.confluence),
            DynamicRiskSizer::new(config.risk.clone()),
            exec_gateway,
            Arc::clone(&memory),
            supervisor.halt_receiver(),
            supervisor.health_receiver(),
            config.execution.clone(),
            events.clone(),
        ));

        let panel = Arc::new(PatternDetectionPanel::with_default_detectors(&config.detection));
        let confluence = Arc::new(ConfluenceConfidenceEngine::new(config.confluence.clone()));

        // Warm-up: minimum viable dataset under the SLA; whatever misses the
        // deadline continues through enhancement instead of blocking start.
        let critical: Vec<CoverageRequirement> =
            config.warmup.critical.iter().map(Into::into).collect();
        let warmup_report = scheduler
            .ensure_minimum_coverage(&critical, config.warmup.deadline())
            .await;
        for miss in &warmup_report.unmet {
            warn!(key = %miss.key, reason = ?miss.reason, "warm-up key unmet, deferring to enhancement");
            if let Some(req) = critical.iter().find(|r| r.key == miss.key) {
                scheduler.enqueue_enhancement(
                    req.key.symbol.as_str(),
                    req.key.timeframe,
                    req.min_bars,
                );
            }
        }
        for target in &config.enhancement.targets {
            scheduler.enqueue_enhancement(target.symbol.as_str(), target.timeframe, target.bars);
        }

        let engine = Self {
            config,
            store,
            scheduler,
            memory,
            machine,
            supervisor,
            panel,
            confluence,
            counters: Arc::new(PerformanceCounters::new()),
            events,
            active_signatures: Arc::new(DashMap::new()),
            warmup_report,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };
        engine.spawn_background_tasks();
        info!(
            warmup_ready = engine.warmup_report.ready.len(),
            warmup_unmet = engine.warmup_report.unmet.len(),
            "trading engine started"
        );
        Ok(engine)
    }

    fn spawn_background_tasks(&self) {
        let mut tasks = self.tasks.lock();

        // Enhancement: low-priority coverage widening.
        {
            let scheduler = Arc::clone(&self.scheduler);
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                scheduler.run_enhancement(cancel).await;
            }));
        }

        // Emergency-stop supervision.
        {
            let supervisor = Arc::clone(&self.supervisor);
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                supervisor.run(cancel).await;
            }));
        }

        // Detection and scoring.
        {
            let store = Arc::clone(&self.store);
            let panel = Arc::clone(&self.panel);
            let confluence = Arc::clone(&self.confluence);
            let memory = Arc::clone(&self.memory);
            let machine = Arc::clone(&self.machine);
            let counters = Arc::clone(&self.counters);
            let events = self.events.clone();
            let active = Arc::clone(&self.active_signatures);
            let detection = self.config.detection.clone();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                let semaphore = Arc::new(Semaphore::new(detection.parallelism));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(detection.interval()) => {}
                    }
                    detection_pass(
                        &store, &panel, &confluence, &memory, &machine, &counters, &events,
                        &active, &detection, &semaphore,
                    )
                    .await;
                }
            }));
        }

        // Halt reaction: force-cancel or close out on every halt edge.
        {
            let machine = Arc::clone(&self.machine);
            let mut halt_rx = self.supervisor.halt_receiver();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        changed = halt_rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let state = *halt_rx.borrow_and_update();
                            if let HaltState::Halted { reason, .. } = state {
                                machine.halt_sweep(reason).await;
                            }
                        }
                    }
                }
            }));
        }

        // Fill reconciliation.
        {
            let machine = Arc::clone(&self.machine);
            let interval = self.config.execution.fill_poll_interval();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => machine.reconcile_fills().await,
                    }
                }
            }));
        }

        // Periodic persistence of trader memory and account health.
        {
            let memory = Arc::clone(&self.memory);
            let supervisor = Arc::clone(&self.supervisor);
            let memory_path = self.config.memory.snapshot_path.clone();
            let health_path = health_snapshot_path(&memory_path);
            let interval = self.config.memory.snapshot_interval();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            if let Err(err) = memory.persist_to(&memory_path) {
                                warn!(error = %err, "trader memory persistence failed");
                            }
                            if let Err(err) =
                                persist_health(&health_path, supervisor.current_health())
                            {
                                warn!(error = %err, "account health persistence failed");
                            }
                        }
                    }
                }
            }));
        }

        // Degraded-coverage forwarding to the event stream.
        {
            let mut degraded_rx = self.scheduler.subscribe_degraded();
            let events = self.events.clone();
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = degraded_rx.recv() => match received {
                            Ok((key, ratio)) => {
                                let _ = events.send(EngineEvent::CoverageDegraded {
                                    key,
                                    completeness_ratio: ratio,
                                    at: Utc::now(),
                                });
                            }
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
            }));
        }

        // Event-driven counters.
        {
            let mut event_rx = self.events.subscribe();
            let counters = Arc::clone(&self.counters);
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = event_rx.recv() => match received {
                            Ok(event) => count_event(&counters, &event),
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    }
                }
            }));
        }
    }

    /// One synchronous detection-scoring pass, also used by tests that need
    /// determinism instead of the interval loop.
    pub async fn run_detection_pass(&self) {
        let semaphore = Arc::new(Semaphore::new(self.config.detection.parallelism));
        detection_pass(
            &self.store,
            &self.panel,
            &self.confluence,
            &self.memory,
            &self.machine,
            &self.counters,
            &self.events,
            &self.active_signatures,
            &self.config.detection,
            &semaphore,
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Consumer API (read-only plus the two supervisor commands).
    // ------------------------------------------------------------------

    pub async fn current_signals(&self) -> Vec<SignalSnapshot> {
        self.machine.current_signals().await
    }

    pub fn account_health(&self) -> AccountHealthSnapshot {
        self.supervisor.current_health()
    }

    pub fn pattern_memory_snapshot(&self) -> PersistedSnapshot<MemoryPayload> {
        self.memory.snapshot()
    }

    pub fn performance_counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Subscribe to the engine event stream.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn force_emergency_stop(&self) {
        self.supervisor.force_emergency_stop();
    }

    pub fn reset_after_recovery(&self) -> Result<(), ResetError> {
        self.supervisor.reset_after_recovery()
    }

    /// Close a filled signal at `exit_price`; outcome feeds trader memory.
    pub async fn close_signal(
        &self,
        id: SignalId,
        exit_price: Decimal,
    ) -> Result<SignalState, execution::ExecutionError> {
        self.machine.close(id, exit_price).await
    }

    /// Warm-up result from startup, for operator inspection.
    pub fn warmup_report(&self) -> &CoverageReport {
        &self.warmup_report
    }

    pub fn candle_snapshot(&self, key: &SeriesKey) -> Option<Arc<types::CandleSeries>> {
        self.store.get_snapshot(key)
    }

    /// Cancel every background task and persist state.
    pub async fn shutdown(&self) {
        info!("trading engine shutting down");
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        if let Err(err) = self.memory.persist_to(&self.config.memory.snapshot_path) {
            warn!(error = %err, "final trader memory persistence failed");
        }
        info!("trading engine stopped");
    }
}

/// Stable identity for an emitted signal setup, used to avoid re-admitting
/// the same setup on every detection pass while it is still live.
fn signature(signal: &TradingSignal) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        signal.symbol,
        signal.direction,
        signal.timeframe,
        signal.entry.normalize(),
        signal.stop.normalize()
    )
}

#[allow(clippy::too_many_arguments)]
async fn detection_pass(
    store: &Arc<CandleStore>,
    panel: &Arc<PatternDetectionPanel>,
    confluence: &Arc<ConfluenceConfidenceEngine>,
    memory: &Arc<TraderMemoryStore>,
    machine: &Arc<ExecutionStateMachine>,
    counters: &Arc<PerformanceCounters>,
    events: &broadcast::Sender<EngineEvent>,
    active: &Arc<DashMap<String, SignalId>>,
    detection: &DetectionConfig,
    semaphore: &Arc<Semaphore>,
) {
    // Fan detection out per (symbol, timeframe) snapshot, bounded by the
    // detection pool so analytical work cannot starve execution.
    let mut join: JoinSet<Vec<types::PatternInstance>> = JoinSet::new();
    for key in store.keys() {
        let Some(snapshot) = store.get_snapshot(&key) else {
            continue;
        };
        let panel = Arc::clone(panel);
        let semaphore = Arc::clone(semaphore);
        join.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            panel.detect_all(&snapshot)
        });
    }

    let mut candidates = Vec::new();
    while let Some(joined) = join.join_next().await {
        match joined {
            Ok(mut found) => candidates.append(&mut found),
            Err(err) => warn!(error = %err, "detection task panicked"),
        }
    }
    counters.record_detection_run(candidates.len() as u64);
    if candidates.is_empty() {
        return;
    }

    let floor = confluence.memory_floor();
    let outcome = confluence.score(candidates, memory, Utc::now());
    for suppressed in &outcome.suppressed {
        let _ = events.send(EngineEvent::CandidateSuppressed {
            pattern_key: suppressed.pattern_key.clone(),
            success_rate: suppressed.success_rate,
            floor,
            at: Utc::now(),
        });
    }

    for signal in outcome.signals {
        let sig = signature(&signal);
        // Copy the id out before awaiting; shard guards must not be held
        // across suspension points.
        let existing = active.get(&sig).map(|entry| *entry.value());
        if let Some(existing) = existing {
            if let Ok(state) = machine.state_of(existing).await {
                if !state.is_terminal() {
                    continue;
                }
            }
        }

        let volatility = store
            .get_snapshot(&SeriesKey::new(signal.symbol.as_str(), signal.timeframe))
            .map(|s| volatility_ratio(&s))
            .unwrap_or(1.0);

        let id = machine.admit(signal);
        active.insert(sig, id);
        match machine.process(id, volatility).await {
            Ok(state) => debug!(signal = %id, %state, "signal processed"),
            Err(err) => debug!(signal = %id, error = %err, "signal terminated: {err}"),
        }
    }
}

fn count_event(counters: &PerformanceCounters, event: &EngineEvent) {
    match event {
        EngineEvent::SignalCreated { .. } => counters.record_signal_emitted(),
        EngineEvent::SignalStateChanged { to, .. } => match to {
            SignalState::Rejected => counters.record_signal_rejected(),
            SignalState::Cancelled => counters.record_signal_cancelled(),
            SignalState::Acknowledged => counters.record_order_acknowledged(),
            _ => {}
        },
        EngineEvent::CandidateSuppressed { .. } => counters.record_suppressed(1),
        EngineEvent::OutcomeRecorded { .. } => counters.record_outcome(),
        EngineEvent::CoverageDegraded { .. } => counters.record_coverage_degraded(),
        EngineEvent::EmergencyHalted { .. } => counters.record_halt(),
        EngineEvent::HaltCleared { .. } => {}
    }
}

fn health_snapshot_path(memory_path: &Path) -> PathBuf {
    memory_path.with_file_name("account_health.json")
}

fn persist_health(
    path: &Path,
    snapshot: AccountHealthSnapshot,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let envelope = PersistedSnapshot::new(
        "account_health",
        snapshot,
        SnapshotMeta {
            latency_ms: 0,
            completeness: 1.0,
        },
    );
    let json = serde_json::to_vec_pretty(&envelope)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}
