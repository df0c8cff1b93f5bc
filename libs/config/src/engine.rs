//! Engine configuration sections, defaults, loading, and validation.

use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use types::Timeframe;

/// One `(symbol, timeframe, bars)` requirement in the warm-up critical set
/// or the enhancement target list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: usize,
}

/// Warm-up: the synchronous, SLA-bounded minimum data load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    /// Worker-pool width for critical-set fetches.
    pub parallelism: usize,
    /// Hard deadline for `ensure_minimum_coverage`.
    pub deadline_ms: u64,
    /// Fixed-delay retries per key during warm-up.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Critical `(symbol, timeframe, min_bars)` set.
    pub critical: Vec<CoverageEntry>,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            deadline_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 500,
            critical: Vec::new(),
        }
    }
}

impl WarmupConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Enhancement: background coverage widening after warm-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Exponential-backoff retries per key before marking it degraded.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Cadence of the low-priority enhancement loop.
    pub tick_interval_ms: u64,
    /// Coverage targets beyond the critical set.
    pub targets: Vec<CoverageEntry>,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            tick_interval_ms: 2_000,
            targets: Vec::new(),
        }
    }
}

impl EnhancementConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Data-feed gateway protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared request budget across warm-up and enhancement.
    pub rate_limit_per_sec: u32,
    pub fetch_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 10,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Pattern-detection panel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Cadence of the detection-scoring loop.
    pub interval_ms: u64,
    /// Worker-pool width for per-pair detection, separate from execution.
    pub parallelism: usize,
    /// Minimum bars in a snapshot before detectors run against it.
    pub min_bars: usize,
    /// Candidate lifetime measured in bars of its own timeframe.
    pub candidate_ttl_bars: u32,
    /// Body-vs-average ratio a candle needs to count as displacement.
    pub displacement_factor: f64,
    /// Bars on each side defining a swing point.
    pub swing_lookback: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            parallelism: 4,
            min_bars: 50,
            candidate_ttl_bars: 12,
            displacement_factor: 1.8,
            swing_lookback: 3,
        }
    }
}

impl DetectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Confluence scoring and signal construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    /// Multiplier applied per confirming higher-timeframe candidate.
    pub htf_multiplier: f64,
    /// Upper clamp for accumulated higher-timeframe multipliers.
    pub htf_multiplier_max: f64,
    /// Composite-confidence ceiling when no higher-timeframe context exists.
    pub no_htf_confidence_ceiling: f64,
    /// Success-rate floor below which a candidate is suppressed outright.
    pub memory_floor: f64,
    /// Minimum lifetime samples before the floor applies.
    pub memory_min_samples: u64,
    /// Zone-overlap tolerance for dedup, as a fraction of zone height.
    pub zone_overlap_tolerance_pct: f64,
    /// Stop placement beyond the distal zone edge, as a fraction of zone
    /// height.
    pub stop_buffer_pct: f64,
    /// Risk-reward multiples for target construction, ascending.
    pub target_rr_multiples: Vec<f64>,
    pub grade_a_min: f64,
    pub grade_b_min: f64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            htf_multiplier: 1.2,
            htf_multiplier_max: 1.5,
            no_htf_confidence_ceiling: 0.65,
            memory_floor: 0.40,
            memory_min_samples: 10,
            zone_overlap_tolerance_pct: 0.25,
            stop_buffer_pct: 0.25,
            target_rr_multiples: vec![1.5, 3.0],
            grade_a_min: 0.85,
            grade_b_min: 0.70,
        }
    }
}

/// Trader memory store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Ring-buffer capacity per pattern key.
    pub window_capacity: usize,
    /// Snapshot file location; `~` expands to the home directory.
    pub snapshot_path: PathBuf,
    /// Periodic persistence cadence.
    pub snapshot_interval_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window_capacity: 50,
            snapshot_path: PathBuf::from("state/trader_memory.json"),
            snapshot_interval_ms: 60_000,
        }
    }
}

impl MemoryConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

/// Signal acceptance rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_confidence: f64,
    pub min_risk_reward: f64,
    /// Require a break-of-structure contribution.
    pub require_structure: bool,
    /// Require at least one supporting zone pattern.
    pub require_zone: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.60,
            min_risk_reward: 1.5,
            require_structure: true,
            require_zone: true,
        }
    }
}

/// Position sizing bounds and damping factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of balance risked per trade.
    pub risk_per_trade_pct: f64,
    /// Size multiplier while account health is Warning.
    pub warning_size_factor: f64,
    /// Size multiplier while account health is Critical.
    pub critical_size_factor: f64,
    /// Volatility ratio (current/baseline) above which damping kicks in.
    pub volatility_damping_threshold: f64,
    /// Size multiplier under elevated volatility.
    pub volatility_size_factor: f64,
    pub min_size: Decimal,
    pub max_size: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.01,
            warning_size_factor: 0.5,
            critical_size_factor: 0.25,
            volatility_damping_threshold: 1.5,
            volatility_size_factor: 0.5,
            min_size: Decimal::new(1, 2),   // 0.01 lots
            max_size: Decimal::new(500, 2), // 5.00 lots
        }
    }
}

/// Close-out behavior for filled positions when an emergency halt lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutMode {
    /// Close the position at market through the execution gateway.
    ForceClose,
    /// Leave the position open for the operator to manage.
    HoldPosition,
}

/// Order submission and lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Bounded submission retries on transient gateway errors.
    pub submit_max_attempts: u32,
    pub submit_backoff_base_ms: u64,
    pub submit_backoff_max_ms: u64,
    /// Overall budget for one submission including retries; expiry marks the
    /// signal Rejected pending reconciliation.
    pub submission_timeout_ms: u64,
    pub fill_poll_interval_ms: u64,
    pub close_out_mode: CloseOutMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            submit_max_attempts: 3,
            submit_backoff_base_ms: 250,
            submit_backoff_max_ms: 5_000,
            submission_timeout_ms: 15_000,
            fill_poll_interval_ms: 500,
            close_out_mode: CloseOutMode::ForceClose,
        }
    }
}

impl ExecutionConfig {
    pub fn submission_timeout(&self) -> Duration {
        Duration::from_millis(self.submission_timeout_ms)
    }

    pub fn fill_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fill_poll_interval_ms)
    }
}

/// Emergency-stop trip thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    pub eval_interval_ms: u64,
    /// Drawdown fraction entering the Warning band.
    pub drawdown_warning_pct: f64,
    /// Drawdown fraction entering the Critical band and tripping the halt.
    pub drawdown_critical_pct: f64,
    pub max_consecutive_losses: u32,
    pub max_daily_loss: Decimal,
    /// Connectivity must stay lost this long before tripping, to avoid
    /// flapping on a single failed probe.
    pub connectivity_grace_ms: u64,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            eval_interval_ms: 1_000,
            drawdown_warning_pct: 0.05,
            drawdown_critical_pct: 0.10,
            max_consecutive_losses: 5,
            max_daily_loss: Decimal::new(1_000, 0),
            connectivity_grace_ms: 10_000,
        }
    }
}

impl EmergencyConfig {
    pub fn eval_interval(&self) -> Duration {
        Duration::from_millis(self.eval_interval_ms)
    }

    pub fn connectivity_grace(&self) -> Duration {
        Duration::from_millis(self.connectivity_grace_ms)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub warmup: WarmupConfig,
    pub enhancement: EnhancementConfig,
    pub gateway: GatewayConfig,
    pub detection: DetectionConfig,
    pub confluence: ConfluenceConfig,
    pub memory: MemoryConfig,
    pub validation: ValidationConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub emergency: EmergencyConfig,
}

impl EngineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file path; `~` in the path is expanded.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let shown = path.as_ref().display().to_string();
        let expanded = shellexpand::tilde(&shown).into_owned();
        let raw = std::fs::read_to_string(&expanded).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %shown, "engine configuration loaded");
        Ok(config)
    }

    /// Cross-field validation. Called on every load; also usable on
    /// hand-built configs in tests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(field: &'static str, v: f64) -> Result<(), ConfigError> {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::invalid(field, format!("{v} outside [0, 1]")));
            }
            Ok(())
        }
        fn positive_factor(field: &'static str, v: f64) -> Result<(), ConfigError> {
            if !(v > 0.0 && v <= 1.0) {
                return Err(ConfigError::invalid(field, format!("{v} outside (0, 1]")));
            }
            Ok(())
        }

        if self.warmup.parallelism == 0 {
            return Err(ConfigError::invalid("warmup.parallelism", "must be > 0"));
        }
        if self.warmup.retry_attempts == 0 {
            return Err(ConfigError::invalid("warmup.retry_attempts", "must be > 0"));
        }
        if self.enhancement.max_retries == 0 {
            return Err(ConfigError::invalid("enhancement.max_retries", "must be > 0"));
        }
        if self.enhancement.backoff_base_ms > self.enhancement.backoff_max_ms {
            return Err(ConfigError::invalid(
                "enhancement.backoff_base_ms",
                "exceeds backoff_max_ms",
            ));
        }
        if self.gateway.rate_limit_per_sec == 0 {
            return Err(ConfigError::invalid(
                "gateway.rate_limit_per_sec",
                "must be > 0",
            ));
        }
        if self.detection.parallelism == 0 {
            return Err(ConfigError::invalid("detection.parallelism", "must be > 0"));
        }
        if self.detection.min_bars < 10 {
            return Err(ConfigError::invalid(
                "detection.min_bars",
                "detectors need at least 10 bars",
            ));
        }
        if self.detection.displacement_factor <= 1.0 {
            return Err(ConfigError::invalid(
                "detection.displacement_factor",
                "must exceed 1.0",
            ));
        }
        if self.detection.swing_lookback == 0 {
            return Err(ConfigError::invalid(
                "detection.swing_lookback",
                "must be > 0",
            ));
        }

        if self.confluence.htf_multiplier < 1.0
            || self.confluence.htf_multiplier > self.confluence.htf_multiplier_max
        {
            return Err(ConfigError::invalid(
                "confluence.htf_multiplier",
                format!(
                    "{} outside [1.0, {}]",
                    self.confluence.htf_multiplier, self.confluence.htf_multiplier_max
                ),
            ));
        }
        if self.confluence.htf_multiplier_max < 1.0 {
            return Err(ConfigError::invalid(
                "confluence.htf_multiplier_max",
                "must be >= 1.0",
            ));
        }
        unit(
            "confluence.no_htf_confidence_ceiling",
            self.confluence.no_htf_confidence_ceiling,
        )?;
        unit("confluence.memory_floor", self.confluence.memory_floor)?;
        unit(
            "confluence.zone_overlap_tolerance_pct",
            self.confluence.zone_overlap_tolerance_pct,
        )?;
        if self.confluence.stop_buffer_pct < 0.0 {
            return Err(ConfigError::invalid(
                "confluence.stop_buffer_pct",
                "must be >= 0",
            ));
        }
        if self.confluence.target_rr_multiples.is_empty() {
            return Err(ConfigError::invalid(
                "confluence.target_rr_multiples",
                "at least one target multiple required",
            ));
        }
        let ascending = self
            .confluence
            .target_rr_multiples
            .windows(2)
            .all(|w| w[0] < w[1]);
        if !ascending || self.confluence.target_rr_multiples[0] <= 0.0 {
            return Err(ConfigError::invalid(
                "confluence.target_rr_multiples",
                "must be positive and strictly ascending",
            ));
        }
        unit("confluence.grade_a_min", self.confluence.grade_a_min)?;
        unit("confluence.grade_b_min", self.confluence.grade_b_min)?;
        if self.confluence.grade_b_min >= self.confluence.grade_a_min {
            return Err(ConfigError::invalid(
                "confluence.grade_b_min",
                "must be below grade_a_min",
            ));
        }

        if self.memory.window_capacity == 0 {
            return Err(ConfigError::invalid("memory.window_capacity", "must be > 0"));
        }

        unit("validation.min_confidence", self.validation.min_confidence)?;
        if self.validation.min_risk_reward <= 0.0 {
            return Err(ConfigError::invalid(
                "validation.min_risk_reward",
                "must be > 0",
            ));
        }

        if !(self.risk.risk_per_trade_pct > 0.0 && self.risk.risk_per_trade_pct <= 0.1) {
            return Err(ConfigError::invalid(
                "risk.risk_per_trade_pct",
                format!("{} outside (0, 0.1]", self.risk.risk_per_trade_pct),
            ));
        }
        positive_factor("risk.warning_size_factor", self.risk.warning_size_factor)?;
        positive_factor("risk.critical_size_factor", self.risk.critical_size_factor)?;
        positive_factor(
            "risk.volatility_size_factor",
            self.risk.volatility_size_factor,
        )?;
        if self.risk.volatility_damping_threshold <= 0.0 {
            return Err(ConfigError::invalid(
                "risk.volatility_damping_threshold",
                "must be > 0",
            ));
        }
        if self.risk.min_size <= Decimal::ZERO || self.risk.min_size > self.risk.max_size {
            return Err(ConfigError::invalid(
                "risk.min_size",
                "must be positive and <= max_size",
            ));
        }

        if self.execution.submit_max_attempts == 0 {
            return Err(ConfigError::invalid(
                "execution.submit_max_attempts",
                "must be > 0",
            ));
        }
        if self.execution.submit_backoff_base_ms > self.execution.submit_backoff_max_ms {
            return Err(ConfigError::invalid(
                "execution.submit_backoff_base_ms",
                "exceeds submit_backoff_max_ms",
            ));
        }

        unit(
            "emergency.drawdown_warning_pct",
            self.emergency.drawdown_warning_pct,
        )?;
        unit(
            "emergency.drawdown_critical_pct",
            self.emergency.drawdown_critical_pct,
        )?;
        if self.emergency.drawdown_warning_pct >= self.emergency.drawdown_critical_pct {
            return Err(ConfigError::invalid(
                "emergency.drawdown_warning_pct",
                "must be below drawdown_critical_pct",
            ));
        }
        if self.emergency.max_consecutive_losses == 0 {
            return Err(ConfigError::invalid(
                "emergency.max_consecutive_losses",
                "must be > 0",
            ));
        }
        if self.emergency.max_daily_loss <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "emergency.max_daily_loss",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
