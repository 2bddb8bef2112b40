//! Volatility ratio: rolling mean of ATR/close over a lookback window.

use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::{rolling_mean, IndicatorSeries, IndicatorType, Smoothing};
use crate::domain::ohlcv::Bar;

pub fn calculate_volatility_ratio(
    bars: &[Bar],
    atr_period: usize,
    lookback: usize,
) -> IndicatorSeries {
    let atr = calculate_atr(bars, atr_period, Smoothing::Wilder);
    let ratios: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| atr.get(i).map(|a| a / bar.close))
        .collect();

    IndicatorSeries::new(
        IndicatorType::VolatilityRatio {
            atr_period,
            lookback,
        },
        rolling_mean(&ratios, lookback),
    )
}
