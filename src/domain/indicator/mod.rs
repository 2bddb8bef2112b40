//! Technical indicator pipeline.
//!
//! Every indicator is computed once, in a single forward pass, into an
//! [`IndicatorSeries`] aligned index-for-index with the input bars. A value is
//! `None` until the indicator has enough history. Values at index `i` depend
//! only on `bars[0..=i]`.
//!
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: one computed series
//! - `IndicatorSet`: the per-run arena of all series a strategy needs

pub mod adx;
pub mod atr;
pub mod donchian;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod volatility;

use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Smoothing {
    Simple,
    Wilder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    VolumeSma(usize),
    Rsi(usize),
    Atr {
        period: usize,
        smoothing: Smoothing,
    },
    Adx(usize),
    PlusDi(usize),
    MinusDi(usize),
    DonchianUpper(usize),
    DonchianLower(usize),
    DonchianMid(usize),
    DonchianWidth(usize),
    VolatilityRatio {
        atr_period: usize,
        lookback: usize,
    },
}

impl IndicatorType {
    /// Number of leading bars whose value is undefined.
    pub fn warmup(&self) -> usize {
        match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::VolumeSma(n)
            | IndicatorType::DonchianUpper(n)
            | IndicatorType::DonchianLower(n)
            | IndicatorType::DonchianMid(n)
            | IndicatorType::DonchianWidth(n) => n.saturating_sub(1),
            IndicatorType::Atr { period, .. } => period.saturating_sub(1),
            IndicatorType::Rsi(n) | IndicatorType::PlusDi(n) | IndicatorType::MinusDi(n) => n,
            IndicatorType::Adx(n) => n.saturating_mul(2).saturating_sub(1),
            IndicatorType::VolatilityRatio {
                atr_period,
                lookback,
            } => atr_period.saturating_add(lookback).saturating_sub(2),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr {
                period,
                smoothing: Smoothing::Wilder,
            } => write!(f, "ATR({})", period),
            IndicatorType::Atr {
                period,
                smoothing: Smoothing::Simple,
            } => write!(f, "ATR_SMA({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::PlusDi(period) => write!(f, "+DI({})", period),
            IndicatorType::MinusDi(period) => write!(f, "-DI({})", period),
            IndicatorType::DonchianUpper(period) => write!(f, "DONCHIAN_UPPER({})", period),
            IndicatorType::DonchianLower(period) => write!(f, "DONCHIAN_LOWER({})", period),
            IndicatorType::DonchianMid(period) => write!(f, "DONCHIAN_MID({})", period),
            IndicatorType::DonchianWidth(period) => write!(f, "DONCHIAN_WIDTH({})", period),
            IndicatorType::VolatilityRatio {
                atr_period,
                lookback,
            } => write!(f, "VOL_RATIO({},{})", atr_period, lookback),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn new(indicator_type: IndicatorType, values: Vec<Option<f64>>) -> Self {
        Self {
            indicator_type,
            values,
        }
    }

    pub fn undefined(indicator_type: IndicatorType, len: usize) -> Self {
        Self::new(indicator_type, vec![None; len])
    }

    /// Value at `index`, or `None` while warming up or out of range.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Compute the full series for one indicator.
pub fn calculate(indicator_type: IndicatorType, bars: &[Bar]) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(period) => sma::calculate_sma(bars, period),
        IndicatorType::Ema(period) => ema::calculate_ema(bars, period),
        IndicatorType::VolumeSma(period) => sma::calculate_volume_sma(bars, period),
        IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, period),
        IndicatorType::Atr { period, smoothing } => atr::calculate_atr(bars, period, smoothing),
        IndicatorType::Adx(period) => adx::calculate_adx(bars, period).adx,
        IndicatorType::PlusDi(period) => adx::calculate_adx(bars, period).plus_di,
        IndicatorType::MinusDi(period) => adx::calculate_adx(bars, period).minus_di,
        IndicatorType::DonchianUpper(period) => donchian::calculate_donchian(bars, period).upper,
        IndicatorType::DonchianLower(period) => donchian::calculate_donchian(bars, period).lower,
        IndicatorType::DonchianMid(period) => donchian::calculate_donchian(bars, period).mid,
        IndicatorType::DonchianWidth(period) => donchian::calculate_donchian(bars, period).width,
        IndicatorType::VolatilityRatio {
            atr_period,
            lookback,
        } => volatility::calculate_volatility_ratio(bars, atr_period, lookback),
    }
}

/// Value of `indicator_type` at the last bar of `bars_up_to_now`.
pub fn compute(indicator_type: IndicatorType, bars_up_to_now: &[Bar]) -> Option<f64> {
    if bars_up_to_now.is_empty() {
        return None;
    }
    calculate(indicator_type, bars_up_to_now).get(bars_up_to_now.len() - 1)
}

/// Rolling arithmetic mean; defined only when the whole window is defined.
pub(crate) fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mut sum = 0.0;
        let mut complete = true;
        for v in window {
            match v {
                Some(x) => sum += x,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

/// Wilder smoothing: seed with the mean of the first `period` defined values,
/// then `avg = (prev * (period - 1) + x) / period`.
pub(crate) fn wilder_smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };

    let Some(seed_end) = start.checked_add(period - 1).filter(|&end| end < values.len()) else {
        return out;
    };
    let seed: Option<f64> = values[start..=seed_end]
        .iter()
        .try_fold(0.0, |acc, v| v.map(|x| acc + x));
    let Some(seed_sum) = seed else {
        return out;
    };

    let mut prev = seed_sum / period as f64;
    out[seed_end] = Some(prev);
    for i in (seed_end + 1)..values.len() {
        if let Some(x) = values[i] {
            prev = (prev * (period - 1) as f64 + x) / period as f64;
            out[i] = Some(prev);
        }
    }
    out
}

/// Per-run arena holding every series a strategy references.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn compute<I>(bars: &[Bar], indicator_types: I) -> Self
    where
        I: IntoIterator<Item = IndicatorType>,
    {
        let mut series = HashMap::new();
        for indicator_type in indicator_types {
            series
                .entry(indicator_type)
                .or_insert_with(|| calculate(indicator_type, bars));
        }
        Self { series }
    }

    pub fn value(&self, indicator_type: IndicatorType, index: usize) -> Option<f64> {
        self.series.get(&indicator_type)?.get(index)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
