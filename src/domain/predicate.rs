//! Typed signal predicates.
//!
//! Each variant carries its own parameters and knows which indicator series it
//! reads. Evaluation is pure: a predicate looks at bar `index` (and, for
//! crossovers and breakouts, `index - 1`) of a precomputed [`IndicatorSet`].
//! An undefined input makes the predicate false.

use std::fmt;

use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaKind {
    Sma,
    Ema,
}

/// A moving average reference such as `ema:12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaSpec {
    pub kind: MaKind,
    pub period: usize,
}

impl MaSpec {
    pub fn sma(period: usize) -> Self {
        MaSpec {
            kind: MaKind::Sma,
            period,
        }
    }

    pub fn ema(period: usize) -> Self {
        MaSpec {
            kind: MaKind::Ema,
            period,
        }
    }

    pub fn indicator(&self) -> IndicatorType {
        match self.kind {
            MaKind::Sma => IndicatorType::Sma(self.period),
            MaKind::Ema => IndicatorType::Ema(self.period),
        }
    }
}

impl fmt::Display for MaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MaKind::Sma => write!(f, "sma:{}", self.period),
            MaKind::Ema => write!(f, "ema:{}", self.period),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateSpec {
    /// Close above/below a moving average.
    Trend { ma: MaSpec, direction: Direction },
    /// RSI inside `[lower, upper]`; a missing bound is open.
    Momentum {
        period: usize,
        lower: Option<f64>,
        upper: Option<f64>,
    },
    /// Volume above `multiplier` times its moving average.
    VolumeConfirmation { period: usize, multiplier: f64 },
    /// Volatility ratio inside `[min_ratio, max_ratio]`.
    VolatilityRegime {
        atr_period: usize,
        lookback: usize,
        min_ratio: Option<f64>,
        max_ratio: Option<f64>,
    },
    /// ADX at least `min_adx`, optionally with +DI above (`Above`) or below
    /// (`Below`) -DI.
    TrendStrength {
        period: usize,
        min_adx: f64,
        di_bias: Option<Direction>,
    },
    /// Close beyond the previous bar's Donchian extreme.
    Breakout { period: usize, direction: Direction },
    /// Fast MA crosses the slow MA on this bar.
    Crossover {
        fast: MaSpec,
        slow: MaSpec,
        direction: Direction,
    },
    /// ADX has dropped below `max_adx`.
    RegimeWeakening { period: usize, max_adx: f64 },
}

impl PredicateSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            PredicateSpec::Trend { .. } => "trend",
            PredicateSpec::Momentum { .. } => "momentum",
            PredicateSpec::VolumeConfirmation { .. } => "volume",
            PredicateSpec::VolatilityRegime { .. } => "volatility_regime",
            PredicateSpec::TrendStrength { .. } => "trend_strength",
            PredicateSpec::Breakout { .. } => "breakout",
            PredicateSpec::Crossover { .. } => "crossover",
            PredicateSpec::RegimeWeakening { .. } => "regime_weakening",
        }
    }

    /// Every indicator series this predicate reads.
    pub fn indicators(&self) -> Vec<IndicatorType> {
        match *self {
            PredicateSpec::Trend { ma, .. } => vec![ma.indicator()],
            PredicateSpec::Momentum { period, .. } => vec![IndicatorType::Rsi(period)],
            PredicateSpec::VolumeConfirmation { period, .. } => {
                vec![IndicatorType::VolumeSma(period)]
            }
            PredicateSpec::VolatilityRegime {
                atr_period,
                lookback,
                ..
            } => vec![IndicatorType::VolatilityRatio {
                atr_period,
                lookback,
            }],
            PredicateSpec::TrendStrength {
                period, di_bias, ..
            } => {
                let mut kinds = vec![IndicatorType::Adx(period)];
                if di_bias.is_some() {
                    kinds.push(IndicatorType::PlusDi(period));
                    kinds.push(IndicatorType::MinusDi(period));
                }
                kinds
            }
            PredicateSpec::Breakout { period, direction } => match direction {
                Direction::Above => vec![IndicatorType::DonchianUpper(period)],
                Direction::Below => vec![IndicatorType::DonchianLower(period)],
            },
            PredicateSpec::Crossover { fast, slow, .. } => {
                vec![fast.indicator(), slow.indicator()]
            }
            PredicateSpec::RegimeWeakening { period, .. } => vec![IndicatorType::Adx(period)],
        }
    }

    /// First bar index at which the predicate can be true.
    pub fn lookback(&self) -> usize {
        let warmup = self
            .indicators()
            .iter()
            .map(IndicatorType::warmup)
            .max()
            .unwrap_or(0);
        match self {
            PredicateSpec::Breakout { .. } | PredicateSpec::Crossover { .. } => {
                warmup.saturating_add(1)
            }
            _ => warmup,
        }
    }

    pub fn evaluate(&self, bars: &[Bar], indicators: &IndicatorSet, index: usize) -> bool {
        let Some(bar) = bars.get(index) else {
            return false;
        };
        let value = |kind: IndicatorType, i: usize| indicators.value(kind, i);

        match *self {
            PredicateSpec::Trend { ma, direction } => match value(ma.indicator(), index) {
                Some(avg) => compare(bar.close, avg, direction),
                None => false,
            },
            PredicateSpec::Momentum {
                period,
                lower,
                upper,
            } => value(IndicatorType::Rsi(period), index)
                .is_some_and(|rsi| within(rsi, lower, upper)),
            PredicateSpec::VolumeConfirmation { period, multiplier } => {
                value(IndicatorType::VolumeSma(period), index)
                    .is_some_and(|avg| bar.volume > multiplier * avg)
            }
            PredicateSpec::VolatilityRegime {
                atr_period,
                lookback,
                min_ratio,
                max_ratio,
            } => value(
                IndicatorType::VolatilityRatio {
                    atr_period,
                    lookback,
                },
                index,
            )
            .is_some_and(|ratio| within(ratio, min_ratio, max_ratio)),
            PredicateSpec::TrendStrength {
                period,
                min_adx,
                di_bias,
            } => {
                let Some(adx) = value(IndicatorType::Adx(period), index) else {
                    return false;
                };
                if adx < min_adx {
                    return false;
                }
                match di_bias {
                    None => true,
                    Some(direction) => match (
                        value(IndicatorType::PlusDi(period), index),
                        value(IndicatorType::MinusDi(period), index),
                    ) {
                        (Some(plus), Some(minus)) => compare(plus, minus, direction),
                        _ => false,
                    },
                }
            }
            PredicateSpec::Breakout { period, direction } => {
                if index == 0 {
                    return false;
                }
                let channel = match direction {
                    Direction::Above => IndicatorType::DonchianUpper(period),
                    Direction::Below => IndicatorType::DonchianLower(period),
                };
                value(channel, index - 1).is_some_and(|level| compare(bar.close, level, direction))
            }
            PredicateSpec::Crossover {
                fast,
                slow,
                direction,
            } => {
                if index == 0 {
                    return false;
                }
                let (fast, slow) = (fast.indicator(), slow.indicator());
                match (
                    value(fast, index - 1),
                    value(slow, index - 1),
                    value(fast, index),
                    value(slow, index),
                ) {
                    (Some(fp), Some(sp), Some(fc), Some(sc)) => match direction {
                        Direction::Above => fp <= sp && fc > sc,
                        Direction::Below => fp >= sp && fc < sc,
                    },
                    _ => false,
                }
            }
            PredicateSpec::RegimeWeakening { period, max_adx } => {
                value(IndicatorType::Adx(period), index).is_some_and(|adx| adx < max_adx)
            }
        }
    }
}

fn compare(value: f64, reference: f64, direction: Direction) -> bool {
    match direction {
        Direction::Above => value > reference,
        Direction::Below => value < reference,
    }
}

fn within(value: f64, lower: Option<f64>, upper: Option<f64>) -> bool {
    lower.is_none_or(|lo| value >= lo) && upper.is_none_or(|hi| value <= hi)
}

/// A predicate bound to the configuration section that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPredicate {
    pub name: String,
    pub spec: PredicateSpec,
}

impl NamedPredicate {
    pub fn new(name: impl Into<String>, spec: PredicateSpec) -> Self {
        NamedPredicate {
            name: name.into(),
            spec,
        }
    }
}
