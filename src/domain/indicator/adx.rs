//! ADX / directional indicators.
//!
//! 1. +DM / -DM from consecutive highs and lows
//! 2. Wilder-smooth TR, +DM and -DM over the period
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR), -DI likewise
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when both DIs are 0
//! 5. ADX = rolling mean of DX over the period
//!
//! A zero smoothed TR yields DI = 0 rather than a division by zero.

use crate::domain::indicator::{rolling_mean, wilder_smooth, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone)]
pub struct AdxSeries {
    pub adx: IndicatorSeries,
    pub plus_di: IndicatorSeries,
    pub minus_di: IndicatorSeries,
}

pub fn calculate_adx(bars: &[Bar], period: usize) -> AdxSeries {
    let n = bars.len();
    let mut tr = vec![None; n];
    let mut plus_dm = vec![None; n];
    let mut minus_dm = vec![None; n];

    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;

        plus_dm[i] = Some(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm[i] = Some(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        tr[i] = Some(bars[i].true_range(bars[i - 1].close));
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];
    let mut dx = vec![None; n];

    for i in 0..n {
        let (Some(atr), Some(p), Some(m)) = (smooth_tr[i], smooth_plus[i], smooth_minus[i]) else {
            continue;
        };
        let (pdi, mdi) = if atr > 0.0 {
            (100.0 * p / atr, 100.0 * m / atr)
        } else {
            (0.0, 0.0)
        };
        let di_sum = pdi + mdi;
        plus_di[i] = Some(pdi);
        minus_di[i] = Some(mdi);
        dx[i] = Some(if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        });
    }

    AdxSeries {
        adx: IndicatorSeries::new(IndicatorType::Adx(period), rolling_mean(&dx, period)),
        plus_di: IndicatorSeries::new(IndicatorType::PlusDi(period), plus_di),
        minus_di: IndicatorSeries::new(IndicatorType::MinusDi(period), minus_di),
    }
}
