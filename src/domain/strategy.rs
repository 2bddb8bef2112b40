//! Strategy definition: which side to trade, when, how big and with which
//! bracket.

use crate::domain::indicator::{IndicatorType, Smoothing};
use crate::domain::order::{BracketSpec, Side, StopDistance};
use crate::domain::predicate::{MaSpec, PredicateSpec};
use crate::domain::signal::SignalComposer;
use crate::domain::sizing::SizingMode;

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub side: Side,
    pub signals: SignalComposer,
    pub sizing: SizingMode,
    pub bracket: BracketSpec,
    pub max_hold_bars: Option<usize>,
}

impl Strategy {
    /// ATR feeding an ATR-multiple stop, if configured.
    pub fn stop_atr(&self) -> Option<IndicatorType> {
        match self.bracket.stop {
            Some(StopDistance::AtrMultiple { period, .. }) => Some(IndicatorType::Atr {
                period,
                smoothing: Smoothing::Wilder,
            }),
            _ => None,
        }
    }

    pub fn trailing_atr(&self) -> Option<IndicatorType> {
        let (_, period) = self.bracket.trailing?.atr?;
        Some(IndicatorType::Atr {
            period,
            smoothing: Smoothing::Wilder,
        })
    }

    pub fn trailing_channel(&self) -> Option<IndicatorType> {
        self.bracket
            .trailing?
            .channel_period
            .map(IndicatorType::DonchianMid)
    }

    /// Every series the run needs: predicate inputs plus bracket inputs.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        let mut kinds = self.signals.required_indicators();
        for kind in [self.stop_atr(), self.trailing_atr(), self.trailing_channel()]
            .into_iter()
            .flatten()
        {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Leading bars on which no entry can be taken.
    pub fn warmup_bars(&self) -> usize {
        let bracket = [self.stop_atr(), self.trailing_atr(), self.trailing_channel()]
            .into_iter()
            .flatten()
            .map(|kind| kind.warmup())
            .max()
            .unwrap_or(0);
        self.signals.warmup_bars().max(bracket)
    }

    /// Copy with every crossover predicate's moving-average periods replaced,
    /// keeping each average's kind.
    pub fn with_crossover_periods(&self, fast: usize, slow: usize) -> Strategy {
        let mut strategy = self.clone();
        for predicate in strategy
            .signals
            .entry
            .iter_mut()
            .chain(strategy.signals.exit.iter_mut())
        {
            if let PredicateSpec::Crossover {
                fast: f, slow: s, ..
            } = &mut predicate.spec
            {
                *f = MaSpec {
                    kind: f.kind,
                    period: fast,
                };
                *s = MaSpec {
                    kind: s.kind,
                    period: slow,
                };
            }
        }
        strategy.name = format!("{} [{}/{}]", self.name, fast, slow);
        strategy
    }
}
