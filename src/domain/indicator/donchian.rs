//! Donchian channel: highest high and lowest low over the last n bars,
//! including the current one. Warmup: first (n-1) bars are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct DonchianSeries {
    pub upper: IndicatorSeries,
    pub lower: IndicatorSeries,
    pub mid: IndicatorSeries,
    pub width: IndicatorSeries,
}

pub fn calculate_donchian(bars: &[Bar], period: usize) -> DonchianSeries {
    let n = bars.len();
    let mut upper = vec![None; n];
    let mut lower = vec![None; n];
    let mut mid = vec![None; n];
    let mut width = vec![None; n];

    if period > 0 {
        for i in (period - 1)..n {
            let window = &bars[i + 1 - period..=i];
            let hi = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lo = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            upper[i] = Some(hi);
            lower[i] = Some(lo);
            mid[i] = Some((hi + lo) / 2.0);
            width[i] = Some(hi - lo);
        }
    }

    DonchianSeries {
        upper: IndicatorSeries::new(IndicatorType::DonchianUpper(period), upper),
        lower: IndicatorSeries::new(IndicatorType::DonchianLower(period), lower),
        mid: IndicatorSeries::new(IndicatorType::DonchianMid(period), mid),
        width: IndicatorSeries::new(IndicatorType::DonchianWidth(period), width),
    }
}
