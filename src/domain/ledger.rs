//! Append-only trade ledger and equity curve.

use chrono::NaiveDateTime;

use super::position::Trade;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    /// Liquidation value of the open position, zero when flat.
    pub position_value: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    pub fn with_capacity(capacity: usize) -> Self {
        EquityCurve {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Append one point; equity is `cash + position_value`. Timestamps must be
    /// increasing.
    pub fn record(&mut self, timestamp: NaiveDateTime, cash: f64, position_value: f64) {
        debug_assert!(self.points.last().is_none_or(|p| p.timestamp < timestamp));
        self.points.push(EquityPoint {
            timestamp,
            cash,
            position_value,
            equity: cash + position_value,
        });
    }

    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&EquityPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// The most recent `n` trades, oldest first.
    pub fn recent(&self, n: usize) -> TradeHistoryWindow<'_> {
        let start = self.trades.len().saturating_sub(n);
        TradeHistoryWindow {
            trades: &self.trades[start..],
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Read-only view over the tail of a ledger.
#[derive(Debug, Clone, Copy)]
pub struct TradeHistoryWindow<'a> {
    trades: &'a [Trade],
}

impl<'a> TradeHistoryWindow<'a> {
    pub fn from_slice(trades: &'a [Trade]) -> Self {
        TradeHistoryWindow { trades }
    }

    pub fn trades(&self) -> &'a [Trade] {
        self.trades
    }

    pub fn returns(&self) -> impl Iterator<Item = f64> + 'a {
        self.trades.iter().map(|t| t.pnl_pct)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::fixtures::day;
    use crate::domain::order::Side;
    use crate::domain::position::ExitReason;

    fn trade(pnl_pct: f64) -> Trade {
        Trade {
            side: Side::Long,
            entry_time: day(0),
            entry_price: 100.0,
            exit_time: day(1),
            exit_price: 100.0 * (1.0 + pnl_pct),
            size: 1.0,
            pnl: 100.0 * pnl_pct,
            pnl_pct,
            duration_bars: 1,
            commission: 0.0,
            exit_reason: ExitReason::Signal,
        }
    }

    #[test]
    fn ledger_records_in_order() {
        let mut ledger = TradeLedger::new();
        assert!(ledger.is_empty());
        ledger.record(trade(0.1));
        ledger.record(trade(-0.05));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.trades()[1].pnl_pct, -0.05);
    }

    #[test]
    fn recent_window_is_bounded_tail() {
        let mut ledger = TradeLedger::new();
        for i in 0..5 {
            ledger.record(trade(i as f64 / 100.0));
        }
        let window = ledger.recent(3);
        assert_eq!(window.len(), 3);
        let returns: Vec<f64> = window.returns().collect();
        assert_eq!(returns, vec![0.02, 0.03, 0.04]);

        assert_eq!(ledger.recent(10).len(), 5);
        assert!(ledger.recent(0).is_empty());
    }

    #[test]
    fn equity_curve_records() {
        let mut curve = EquityCurve::with_capacity(2);
        curve.record(day(0), 100.0, 0.0);
        curve.record(day(1), 50.0, 51.5);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.points()[1].equity, 101.5);
        assert_eq!(curve.points()[1].position_value, 51.5);
        assert_eq!(curve.last().unwrap().timestamp, day(1));
    }
}
