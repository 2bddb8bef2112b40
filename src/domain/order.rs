//! Orders and bracket (stop-loss / take-profit / trailing) arithmetic.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Distance from entry to the protective stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopDistance {
    /// Fraction of the entry price (0.01 = 1%).
    Percent(f64),
    /// Multiple of the ATR at signal time.
    AtrMultiple { multiple: f64, period: usize },
}

/// Distance from entry to the profit target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TakeProfitDistance {
    /// Fraction of the entry price.
    Percent(f64),
    /// Multiple of the stop distance.
    RewardRisk(f64),
}

/// Trailing-stop candidates. Each enabled input produces a candidate level per
/// bar and the most protective one wins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrailingSpec {
    /// Candidate = extreme -/+ multiple * ATR(period).
    pub atr: Option<(f64, usize)>,
    /// Candidate = extreme * (1 -/+ pct).
    pub percent: Option<f64>,
    /// Candidate = Donchian midline over this period.
    pub channel_period: Option<usize>,
}

impl TrailingSpec {
    pub fn is_empty(&self) -> bool {
        self.atr.is_none() && self.percent.is_none() && self.channel_period.is_none()
    }

    /// Best candidate level for this bar; `None` if no input is defined yet.
    pub fn candidate(
        &self,
        side: Side,
        high: f64,
        low: f64,
        atr: Option<f64>,
        channel_mid: Option<f64>,
    ) -> Option<f64> {
        let extreme = match side {
            Side::Long => high,
            Side::Short => low,
        };
        let mut levels = Vec::with_capacity(3);
        if let (Some((multiple, _)), Some(atr)) = (self.atr, atr) {
            levels.push(extreme - side.sign() * multiple * atr);
        }
        if let Some(pct) = self.percent {
            levels.push(extreme * (1.0 - side.sign() * pct));
        }
        if self.channel_period.is_some() {
            if let Some(mid) = channel_mid {
                levels.push(mid);
            }
        }
        levels.into_iter().reduce(|a, b| match side {
            Side::Long => a.max(b),
            Side::Short => a.min(b),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BracketSpec {
    pub stop: Option<StopDistance>,
    pub take_profit: Option<TakeProfitDistance>,
    pub trailing: Option<TrailingSpec>,
}

/// Absolute distances resolved at signal time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BracketDistances {
    pub stop: Option<f64>,
    pub target: Option<f64>,
}

impl BracketSpec {
    /// Resolve price distances for an entry at `reference_price`.
    ///
    /// Returns `None` when an ATR-based stop is configured but the ATR is not
    /// yet defined.
    pub fn distances(&self, reference_price: f64, atr: Option<f64>) -> Option<BracketDistances> {
        let stop = match self.stop {
            Some(StopDistance::Percent(pct)) => Some(reference_price * pct),
            Some(StopDistance::AtrMultiple { multiple, .. }) => Some(multiple * atr?),
            None => None,
        };
        let target = match self.take_profit {
            Some(TakeProfitDistance::Percent(pct)) => Some(reference_price * pct),
            Some(TakeProfitDistance::RewardRisk(ratio)) => stop.map(|s| s * ratio),
            None => None,
        };
        Some(BracketDistances { stop, target })
    }

    pub fn trailing_enabled(&self) -> bool {
        self.trailing.is_some_and(|t| !t.is_empty())
    }
}

/// Stop and target levels for an entry at `entry_price`.
pub fn bracket_levels(
    side: Side,
    entry_price: f64,
    distances: BracketDistances,
) -> (Option<f64>, Option<f64>) {
    let stop = distances.stop.map(|d| entry_price - side.sign() * d);
    let target = distances.target.map(|d| entry_price + side.sign() * d);
    (stop, target)
}

/// A sized entry request, alive from signal until fill or rejection.
///
/// `stop_loss` and `take_profit` are quoted against the signal-time
/// reference price; the fill re-resolves them with [`Order::levels_at`].
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub trailing_enabled: bool,
    pub bracket: BracketSpec,
    /// ATR at signal time, frozen for ATR-multiple stops.
    pub stop_atr: Option<f64>,
    pub signal_index: usize,
}

impl Order {
    pub fn new(
        side: Side,
        size: f64,
        entry_price: f64,
        bracket: BracketSpec,
        stop_atr: Option<f64>,
        signal_index: usize,
    ) -> Self {
        let distances = bracket
            .distances(entry_price, stop_atr)
            .unwrap_or_default();
        let (stop_loss, take_profit) = bracket_levels(side, entry_price, distances);
        Order {
            side,
            size,
            entry_price,
            stop_loss,
            take_profit,
            trailing_enabled: bracket.trailing_enabled(),
            bracket,
            stop_atr,
            signal_index,
        }
    }

    /// Stop and target for a fill at `fill_price`.
    pub fn levels_at(&self, fill_price: f64) -> (Option<f64>, Option<f64>) {
        let distances = self
            .bracket
            .distances(fill_price, self.stop_atr)
            .unwrap_or_default();
        bracket_levels(self.side, fill_price, distances)
    }
}
