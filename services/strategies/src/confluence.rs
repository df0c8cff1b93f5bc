//! Confluence scoring: raw pattern candidates in, deduplicated and
//! memory-filtered trading signals out.
//!
//! Pipeline per scoring pass:
//! 1. expired candidates are dropped;
//! 2. the memory floor suppresses candidates whose pattern key has a poor
//!    historical success rate — a hard filter, not a discount;
//! 3. same-symbol, same-direction candidates with overlapping zones and
//!    overlapping time windows merge into one cluster, keeping the highest
//!    raw confidence and the union of contributing keys;
//! 4. higher-timeframe agreement multiplies the cluster confidence upward
//!    within configured bounds; a cluster with no higher-timeframe context
//!    is capped below the configured ceiling;
//! 5. entry, stop, and targets derive from the merged zone.

use crate::memory::TraderMemoryStore;
use chrono::{DateTime, Utc};
use config::ConfluenceConfig;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, trace};
use types::{
    Direction, PatternInstance, PatternKey, PriceZone, SignalGrade, SignalId, Symbol, Timeframe,
    TradingSignal,
};

/// A candidate dropped by the memory floor, reported for the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressedCandidate {
    pub pattern_key: PatternKey,
    pub success_rate: f64,
    pub raw_confidence: f64,
}

/// Result of one scoring pass.
#[derive(Debug, Clone, Default)]
pub struct ScoreOutcome {
    pub signals: Vec<TradingSignal>,
    pub suppressed: Vec<SuppressedCandidate>,
}

struct Cluster {
    symbol: Symbol,
    direction: Direction,
    zone: PriceZone,
    members: Vec<PatternInstance>,
}

impl Cluster {
    fn primary(&self) -> &PatternInstance {
        // Members arrive sorted by raw confidence, highest first.
        &self.members[0]
    }

    fn accepts(&self, candidate: &PatternInstance, tolerance: f64) -> bool {
        self.symbol == candidate.symbol
            && self.direction == candidate.direction
            && self.zone.overlaps_within(&candidate.zone, tolerance)
            && windows_overlap(self.primary(), candidate)
    }

    fn absorb(&mut self, candidate: PatternInstance) {
        self.zone = self.zone.merge(&candidate.zone);
        self.members.push(candidate);
    }
}

fn windows_overlap(a: &PatternInstance, b: &PatternInstance) -> bool {
    a.detected_at <= b.expires_at && b.detected_at <= a.expires_at
}

pub struct ConfluenceConfidenceEngine {
    config: ConfluenceConfig,
}

impl ConfluenceConfidenceEngine {
    pub fn new(config: ConfluenceConfig) -> Self {
        Self { config }
    }

    /// The configured suppression floor, for event reporting.
    pub fn memory_floor(&self) -> f64 {
        self.config.memory_floor
    }

    /// Score one batch of candidates against the outcome memory.
    pub fn score(
        &self,
        candidates: Vec<PatternInstance>,
        memory: &TraderMemoryStore,
        now: DateTime<Utc>,
    ) -> ScoreOutcome {
        let mut outcome = ScoreOutcome::default();

        let mut live: Vec<PatternInstance> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.is_expired(now) {
                trace!(key = %candidate.key(), "candidate expired, dropped");
                continue;
            }
            match memory.success_rate(&candidate.key()) {
                Some((rate, samples))
                    if samples >= self.config.memory_min_samples
                        && rate < self.config.memory_floor =>
                {
                    debug!(
                        key = %candidate.key(),
                        success_rate = rate,
                        floor = self.config.memory_floor,
                        "candidate suppressed by memory floor"
                    );
                    outcome.suppressed.push(SuppressedCandidate {
                        pattern_key: candidate.key(),
                        success_rate: rate,
                        raw_confidence: candidate.raw_confidence,
                    });
                }
                _ => live.push(candidate),
            }
        }

        // Highest confidence first so each cluster's primary is its best
        // member and absorption order is deterministic.
        live.sort_by(|a, b| {
            b.raw_confidence
                .partial_cmp(&a.raw_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut clusters: Vec<Cluster> = Vec::new();
        for candidate in live {
            match clusters
                .iter_mut()
                .find(|c| c.accepts(&candidate, self.config.zone_overlap_tolerance_pct))
            {
                Some(cluster) => cluster.absorb(candidate),
                None => clusters.push(Cluster {
                    symbol: candidate.symbol.clone(),
                    direction: candidate.direction,
                    zone: candidate.zone,
                    members: vec![candidate],
                }),
            }
        }

        // Timeframes present per (symbol, direction), for confirmation
        // lookups across clusters.
        let group_timeframes = |symbol: &Symbol, direction: Direction| -> BTreeSet<Timeframe> {
            clusters
                .iter()
                .filter(|c| &c.symbol == symbol && c.direction == direction)
                .flat_map(|c| c.members.iter().map(|m| m.timeframe))
                .collect()
        };

        for cluster in &clusters {
            let primary = cluster.primary();
            let timeframes = group_timeframes(&cluster.symbol, cluster.direction);
            let confirmations = timeframes
                .iter()
                .filter(|tf| tf.is_higher_than(primary.timeframe))
                .count();

            let multiplier = self
                .config
                .htf_multiplier
                .powi(confirmations as i32)
                .min(self.config.htf_multiplier_max);
            let mut composite = primary.raw_confidence * multiplier;
            if confirmations == 0 {
                composite = composite.min(self.config.no_htf_confidence_ceiling);
            }
            composite = composite.min(1.0);

            if let Some(signal) = self.build_signal(cluster, composite, now) {
                outcome.signals.push(signal);
            }
        }

        outcome.signals.sort_by(|a, b| {
            b.composite_confidence
                .partial_cmp(&a.composite_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        outcome
    }

    fn build_signal(
        &self,
        cluster: &Cluster,
        composite: f64,
        now: DateTime<Utc>,
    ) -> Option<TradingSignal> {
        let zone = cluster.zone;
        let buffer = zone.height() * Decimal::try_from(self.config.stop_buffer_pct).ok()?;

        let (entry, stop) = match cluster.direction {
            Direction::Long => (zone.high, zone.low - buffer),
            Direction::Short => (zone.low, zone.high + buffer),
        };
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            debug!(symbol = %cluster.symbol, "degenerate zone, no signal");
            return None;
        }

        let targets: Vec<Decimal> = self
            .config
            .target_rr_multiples
            .iter()
            .filter_map(|rr| Decimal::try_from(*rr).ok())
            .map(|rr| match cluster.direction {
                Direction::Long => entry + risk * rr,
                Direction::Short => entry - risk * rr,
            })
            .collect();

        let grade = if composite >= self.config.grade_a_min {
            SignalGrade::A
        } else if composite >= self.config.grade_b_min {
            SignalGrade::B
        } else {
            SignalGrade::C
        };

        let mut contributing: Vec<PatternKey> = Vec::new();
        for member in &cluster.members {
            let key = member.key();
            if !contributing.contains(&key) {
                contributing.push(key);
            }
        }

        Some(TradingSignal {
            id: SignalId::new(),
            symbol: cluster.symbol.clone(),
            direction: cluster.direction,
            timeframe: cluster.primary().timeframe,
            entry,
            stop,
            targets,
            composite_confidence: composite,
            grade,
            contributing_patterns: contributing,
            created_at: now,
        })
    }
}
