//! Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high-low, |high-prevClose|, |low-prevClose|).
//! Smoothed either as a rolling mean or with Wilder's recursion seeded by the
//! mean of the first n true ranges. Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{
    rolling_mean, wilder_smooth, IndicatorSeries, IndicatorType, Smoothing,
};
use crate::domain::ohlcv::Bar;

pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize, smoothing: Smoothing) -> IndicatorSeries {
    let tr: Vec<Option<f64>> = true_ranges(bars).into_iter().map(Some).collect();
    let values = match smoothing {
        Smoothing::Simple => rolling_mean(&tr, period),
        Smoothing::Wilder => wilder_smooth(&tr, period),
    };
    IndicatorSeries::new(IndicatorType::Atr { period, smoothing }, values)
}
