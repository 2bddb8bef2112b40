//! Open position state and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

use super::order::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_enabled: bool,
    pub trailing_stop: Option<f64>,
    pub entry_commission: f64,
}

impl Position {
    /// Gross exposure at `price`.
    pub fn notional(&self, price: f64) -> f64 {
        self.size * price
    }

    /// Cash the position would return if liquidated at `price`, before exit
    /// commission. Shorts escrow their entry notional, so they return the
    /// escrow plus the price difference.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.size * price,
            Side::Short => self.size * (2.0 * self.entry_price - price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * self.size * (price - self.entry_price)
    }

    /// The stop currently in force: the tighter of the fixed and trailing stops.
    pub fn current_stop(&self) -> Option<f64> {
        match (self.stop_loss, self.trailing_stop) {
            (Some(s), Some(t)) => Some(match self.side {
                Side::Long => s.max(t),
                Side::Short => s.min(t),
            }),
            (s, t) => s.or(t),
        }
    }

    /// True when the active stop came from the trailing ratchet.
    pub fn trailing_is_active(&self) -> bool {
        match (self.stop_loss, self.trailing_stop) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(s), Some(t)) => match self.side {
                Side::Long => t > s,
                Side::Short => t < s,
            },
        }
    }

    pub fn stop_hit(&self, high: f64, low: f64) -> Option<f64> {
        let stop = self.current_stop()?;
        let hit = match self.side {
            Side::Long => low <= stop,
            Side::Short => high >= stop,
        };
        hit.then_some(stop)
    }

    pub fn target_hit(&self, high: f64, low: f64) -> Option<f64> {
        let target = self.take_profit?;
        let hit = match self.side {
            Side::Long => high >= target,
            Side::Short => low <= target,
        };
        hit.then_some(target)
    }

    /// Move the trailing stop toward the candidate; never loosens.
    pub fn ratchet_trailing(&mut self, candidate: f64) {
        if !self.trailing_enabled {
            return;
        }
        self.trailing_stop = Some(match (self.side, self.trailing_stop) {
            (_, None) => candidate,
            (Side::Long, Some(prior)) => prior.max(candidate),
            (Side::Short, Some(prior)) => prior.min(candidate),
        });
    }

    pub fn bars_held(&self, index: usize) -> usize {
        index.saturating_sub(self.entry_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    MaxHold,
    Signal,
    ExposureLimit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::MaxHold => "max_hold",
            ExitReason::Signal => "signal",
            ExitReason::ExposureLimit => "exposure_limit",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

/// Immutable record of a round trip. `pnl` is net of both commissions;
/// `pnl_pct` is `pnl` over the entry notional.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub duration_bars: usize,
    pub commission: f64,
    pub exit_reason: ExitReason,
}
