//! OHLCV bar representation and input validation.

use chrono::NaiveDateTime;

use crate::domain::error::SimError;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reject bar sequences the engine cannot replay.
///
/// Timestamps must be strictly increasing, prices finite and positive with
/// `low <= open, close <= high`, and volume finite and non-negative.
pub fn validate_bars(bars: &[Bar], source_name: &str) -> Result<(), SimError> {
    if bars.is_empty() {
        return Err(SimError::NoData {
            source_name: source_name.to_string(),
        });
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SimError::data(i, "prices must be finite and positive"));
        }
        if bar.low > bar.high {
            return Err(SimError::data(i, "low above high"));
        }
        if bar.open < bar.low || bar.open > bar.high || bar.close < bar.low || bar.close > bar.high
        {
            return Err(SimError::data(i, "open/close outside the high-low range"));
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(SimError::data(i, "volume must be finite and non-negative"));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(SimError::data(
                i,
                format!(
                    "timestamp {} does not follow {}",
                    bar.timestamp,
                    bars[i - 1].timestamp
                ),
            ));
        }
    }

    Ok(())
}
