//! Signal validation: structural and statistical acceptance rules.
//!
//! Every unmet rule rejects with a specific `RejectReason`; a generic
//! failure is never produced. The memory-floor rule here is defense in
//! depth behind the confluence engine's suppression — a signal assembled
//! before a streak of losses landed can still be caught at validation time.

use config::{ConfluenceConfig, ValidationConfig};
use rust_decimal::Decimal;
use strategies::TraderMemoryStore;
use tracing::debug;
use types::{Direction, RejectReason, TradingSignal};

pub struct SignalValidator {
    min_confidence: f64,
    min_risk_reward: f64,
    require_structure: bool,
    require_zone: bool,
    memory_floor: f64,
    memory_min_samples: u64,
}

impl SignalValidator {
    pub fn new(validation: &ValidationConfig, confluence: &ConfluenceConfig) -> Self {
        Self {
            min_confidence: validation.min_confidence,
            min_risk_reward: validation.min_risk_reward,
            require_structure: validation.require_structure,
            require_zone: validation.require_zone,
            memory_floor: confluence.memory_floor,
            memory_min_samples: confluence.memory_min_samples,
        }
    }

    /// Check every acceptance rule; the first unmet rule names the
    /// rejection.
    pub fn validate(
        &self,
        signal: &TradingSignal,
        halted: bool,
        memory: &TraderMemoryStore,
    ) -> Result<(), RejectReason> {
        if halted {
            return Err(RejectReason::HaltActive);
        }

        if signal.composite_confidence < self.min_confidence {
            return Err(RejectReason::ConfidenceBelowMinimum);
        }

        if signal.targets.is_empty() {
            return Err(RejectReason::NoTargets);
        }

        let stop_ok = match signal.direction {
            Direction::Long => signal.stop < signal.entry,
            Direction::Short => signal.stop > signal.entry,
        };
        if !stop_ok {
            return Err(RejectReason::StopOnWrongSide);
        }

        let min_rr = Decimal::try_from(self.min_risk_reward).unwrap_or(Decimal::ONE);
        match signal.risk_reward() {
            Some(rr) if rr >= min_rr => {}
            _ => return Err(RejectReason::RiskRewardBelowMinimum),
        }

        if self.require_structure
            && !signal
                .contributing_patterns
                .iter()
                .any(|k| !k.detector.is_zone())
        {
            return Err(RejectReason::MissingStructureConfirmation);
        }

        if self.require_zone
            && !signal
                .contributing_patterns
                .iter()
                .any(|k| k.detector.is_zone())
        {
            return Err(RejectReason::MissingZoneConfirmation);
        }

        for key in &signal.contributing_patterns {
            if let Some((rate, samples)) = memory.success_rate(key) {
                if samples >= self.memory_min_samples && rate < self.memory_floor {
                    debug!(
                        signal = %signal.id,
                        pattern_key = %key,
                        success_rate = rate,
                        "memory floor breached at validation"
                    );
                    return Err(RejectReason::MemoryFloorBreached);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use types::{DetectorKind, PatternKey, SignalGrade, SignalId, Symbol, Timeframe};

    fn validator() -> SignalValidator {
        SignalValidator::new(&ValidationConfig::default(), &ConfluenceConfig::default())
    }

    fn signal() -> TradingSignal {
        TradingSignal {
            id: SignalId::new(),
            symbol: Symbol::new("EURUSD"),
            direction: Direction::Long,
            timeframe: Timeframe::M15,
            entry: dec!(1.1010),
            stop: dec!(1.0990),
            targets: vec![dec!(1.1040), dec!(1.1070)],
            composite_confidence: 0.75,
            grade: SignalGrade::B,
            contributing_patterns: vec![
                PatternKey::new(DetectorKind::OrderBlock, Symbol::new("EURUSD"), Timeframe::M15),
                PatternKey::new(
                    DetectorKind::BreakOfStructure,
                    Symbol::new("EURUSD"),
                    Timeframe::M15,
                ),
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn well_formed_signal_passes() {
        let memory = TraderMemoryStore::new(50);
        assert!(validator().validate(&signal(), false, &memory).is_ok());
    }

    #[test]
    fn halt_rejects_before_anything_else() {
        let memory = TraderMemoryStore::new(50);
        assert_eq!(
            validator().validate(&signal(), true, &memory),
            Err(RejectReason::HaltActive)
        );
    }

    #[test]
    fn low_confidence_named_specifically() {
        let memory = TraderMemoryStore::new(50);
        let mut s = signal();
        s.composite_confidence = 0.30;
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::ConfidenceBelowMinimum)
        );
    }

    #[test]
    fn stop_above_long_entry_rejected() {
        let memory = TraderMemoryStore::new(50);
        let mut s = signal();
        s.stop = dec!(1.1020);
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::StopOnWrongSide)
        );
    }

    #[test]
    fn thin_risk_reward_rejected() {
        let memory = TraderMemoryStore::new(50);
        let mut s = signal();
        s.targets = vec![dec!(1.1015)]; // 0.25 RR against a 20-pip stop
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::RiskRewardBelowMinimum)
        );
    }

    #[test]
    fn missing_structure_confirmation_rejected() {
        let memory = TraderMemoryStore::new(50);
        let mut s = signal();
        s.contributing_patterns = vec![PatternKey::new(
            DetectorKind::OrderBlock,
            Symbol::new("EURUSD"),
            Timeframe::M15,
        )];
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::MissingStructureConfirmation)
        );
    }

    #[test]
    fn missing_zone_confirmation_rejected() {
        let memory = TraderMemoryStore::new(50);
        let mut s = signal();
        s.contributing_patterns = vec![PatternKey::new(
            DetectorKind::BreakOfStructure,
            Symbol::new("EURUSD"),
            Timeframe::M15,
        )];
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::MissingZoneConfirmation)
        );
    }

    #[test]
    fn memory_floor_is_checked_again_at_validation() {
        let memory = TraderMemoryStore::new(50);
        let s = signal();
        // Record a losing streak for one contributing key after the signal
        // was assembled.
        for _ in 0..12 {
            memory.record_outcome(&s.contributing_patterns[0], false);
        }
        assert_eq!(
            validator().validate(&s, false, &memory),
            Err(RejectReason::MemoryFloorBreached)
        );
    }
}
