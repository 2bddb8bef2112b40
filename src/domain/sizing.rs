//! Position sizing: fixed-fractional risk or adaptive half-Kelly.
//!
//! The sizer reads the trade ledger through a [`TradeHistoryWindow`] and
//! never mutates engine state.

use crate::domain::broker::affordable_units;
use crate::domain::ledger::TradeHistoryWindow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellyParams {
    /// Number of most recent trades considered.
    pub window: usize,
    pub min_fraction: f64,
    pub max_fraction: f64,
    /// Used until the window holds at least two trades with both wins and
    /// losses.
    pub fallback: f64,
}

impl Default for KellyParams {
    fn default() -> Self {
        KellyParams {
            window: 20,
            min_fraction: 0.05,
            max_fraction: 0.5,
            fallback: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingMode {
    /// Risk `risk_fraction` of equity between entry and stop.
    FixedFractional { risk_fraction: f64 },
    /// Commit a Kelly-derived fraction of equity.
    Kelly(KellyParams),
}

/// Half-Kelly fraction over the window, clamped to the configured bounds.
///
/// Falls back to `params.fallback` with fewer than two trades, without both
/// wins and losses, or when the average loss is zero.
pub fn kelly_fraction(history: TradeHistoryWindow<'_>, params: &KellyParams) -> f64 {
    if history.len() < 2 {
        return params.fallback;
    }

    let (mut wins, mut win_sum, mut losses, mut loss_sum) = (0usize, 0.0, 0usize, 0.0);
    for r in history.returns() {
        if r > 0.0 {
            wins += 1;
            win_sum += r;
        } else if r < 0.0 {
            losses += 1;
            loss_sum += r;
        }
    }
    if wins == 0 || losses == 0 {
        return params.fallback;
    }

    let avg_win = win_sum / wins as f64;
    let avg_loss = loss_sum / losses as f64;
    if avg_loss == 0.0 {
        return params.fallback;
    }

    let win_rate = wins as f64 / history.len() as f64;
    let win_loss_ratio = avg_win / avg_loss.abs();
    let kelly = (win_rate * win_loss_ratio - (1.0 - win_rate)) / win_loss_ratio;
    (kelly * 0.5).clamp(params.min_fraction, params.max_fraction)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub mode: SizingMode,
    pub fractional_units: bool,
}

/// Everything the sizer needs to know about the pending entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInput {
    pub equity: f64,
    pub cash: f64,
    pub entry_price: f64,
    /// Absolute entry-to-stop distance, when a stop is configured.
    pub stop_distance: Option<f64>,
    pub commission_rate: f64,
}

impl PositionSizer {
    pub fn new(mode: SizingMode, fractional_units: bool) -> Self {
        PositionSizer {
            mode,
            fractional_units,
        }
    }

    pub fn history_window(&self) -> usize {
        match self.mode {
            SizingMode::FixedFractional { .. } => 0,
            SizingMode::Kelly(params) => params.window,
        }
    }

    /// Order size, capped by what cash can afford. Zero means "do not trade".
    pub fn size(&self, input: &SizingInput, history: TradeHistoryWindow<'_>) -> f64 {
        if input.entry_price <= 0.0 || input.equity <= 0.0 {
            return 0.0;
        }

        let raw = match self.mode {
            SizingMode::FixedFractional { risk_fraction } => match input.stop_distance {
                Some(distance) if distance > 0.0 => input.equity * risk_fraction / distance,
                _ => 0.0,
            },
            SizingMode::Kelly(params) => {
                input.equity * kelly_fraction(history, &params) / input.entry_price
            }
        };

        let affordable = affordable_units(
            input.cash,
            input.entry_price,
            input.commission_rate,
            self.fractional_units,
        );
        let capped = raw.min(affordable).max(0.0);
        if self.fractional_units {
            capped
        } else {
            capped.floor()
        }
    }
}
