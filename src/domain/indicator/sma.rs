//! Simple Moving Average over closes or volume.
//!
//! SMA[i] = mean(x[i-n+1..=i]). Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{rolling_mean, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    IndicatorSeries::new(IndicatorType::Sma(period), rolling_mean(&closes, period))
}

pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let volumes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.volume)).collect();
    IndicatorSeries::new(
        IndicatorType::VolumeSma(period),
        rolling_mean(&volumes, period),
    )
}
