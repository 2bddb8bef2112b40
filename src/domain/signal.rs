//! Entry/exit decision from the configured predicate sets.

use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ohlcv::Bar;
use crate::domain::predicate::NamedPredicate;

/// How exit predicates combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitMode {
    /// Every exit predicate must hold.
    #[default]
    All,
    /// Any single exit predicate suffices.
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalComposer {
    pub entry: Vec<NamedPredicate>,
    pub exit: Vec<NamedPredicate>,
    pub exit_mode: ExitMode,
}

impl SignalComposer {
    pub fn new(entry: Vec<NamedPredicate>, exit: Vec<NamedPredicate>, exit_mode: ExitMode) -> Self {
        SignalComposer {
            entry,
            exit,
            exit_mode,
        }
    }

    /// Conjunction of the entry predicates. An empty set never enters.
    pub fn should_enter(&self, bars: &[Bar], indicators: &IndicatorSet, index: usize) -> bool {
        !self.entry.is_empty()
            && self
                .entry
                .iter()
                .all(|p| p.spec.evaluate(bars, indicators, index))
    }

    /// Exit predicates combined per `exit_mode`. An empty set never exits.
    pub fn should_exit(&self, bars: &[Bar], indicators: &IndicatorSet, index: usize) -> bool {
        if self.exit.is_empty() {
            return false;
        }
        let mut results = self
            .exit
            .iter()
            .map(|p| p.spec.evaluate(bars, indicators, index));
        match self.exit_mode {
            ExitMode::All => results.all(|hit| hit),
            ExitMode::Any => results.any(|hit| hit),
        }
    }

    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut kinds: Vec<IndicatorType> = Vec::new();
        for predicate in self.entry.iter().chain(&self.exit) {
            for kind in predicate.spec.indicators() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    /// Longest lookback over all entry and exit predicates.
    pub fn warmup_bars(&self) -> usize {
        self.entry
            .iter()
            .chain(&self.exit)
            .map(|p| p.spec.lookback())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::fixtures::from_closes;
    use crate::domain::predicate::{Direction, MaSpec, PredicateSpec};

    fn above(period: usize) -> NamedPredicate {
        NamedPredicate::new(
            format!("above_{period}"),
            PredicateSpec::Trend {
                ma: MaSpec::sma(period),
                direction: Direction::Above,
            },
        )
    }

    fn below(period: usize) -> NamedPredicate {
        NamedPredicate::new(
            format!("below_{period}"),
            PredicateSpec::Trend {
                ma: MaSpec::sma(period),
                direction: Direction::Below,
            },
        )
    }

    fn setup() -> (Vec<Bar>, SignalComposer) {
        let bars = from_closes(&[10.0, 10.0, 10.0, 12.0, 11.0]);
        let composer = SignalComposer::new(
            vec![above(2), above(3)],
            vec![below(2), above(3)],
            ExitMode::All,
        );
        (bars, composer)
    }

    #[test]
    fn entry_is_conjunction() {
        let (bars, composer) = setup();
        let set = IndicatorSet::compute(&bars, composer.required_indicators());
        // sma2 warm from 1, sma3 from 2
        assert!(!composer.should_enter(&bars, &set, 1));
        assert!(!composer.should_enter(&bars, &set, 2));
        assert!(composer.should_enter(&bars, &set, 3));
    }

    #[test]
    fn exit_all_versus_any() {
        let (bars, mut composer) = setup();
        let set = IndicatorSet::compute(&bars, composer.required_indicators());
        // bar 4: close 11 < sma2 11.5, close 11 vs sma3 11.0 not above
        assert!(!composer.should_exit(&bars, &set, 4));
        composer.exit_mode = ExitMode::Any;
        assert!(composer.should_exit(&bars, &set, 4));
    }

    #[test]
    fn empty_sets_never_fire() {
        let bars = from_closes(&[10.0, 11.0]);
        let composer = SignalComposer::new(vec![], vec![], ExitMode::Any);
        let set = IndicatorSet::default();
        assert!(!composer.should_enter(&bars, &set, 1));
        assert!(!composer.should_exit(&bars, &set, 1));
        assert_eq!(composer.warmup_bars(), 0);
    }

    #[test]
    fn required_indicators_deduplicated() {
        let (_, composer) = setup();
        let kinds = composer.required_indicators();
        assert_eq!(kinds.len(), 2);
        assert_eq!(composer.warmup_bars(), 2);
    }
}
