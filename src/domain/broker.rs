//! Simulated broker: owns cash and the single-position state machine.
//!
//! `Flat -> PendingEntry -> Open -> Flat`. A close appends nothing itself; it
//! returns the [`Trade`] for the caller to record.

use chrono::NaiveDateTime;

use super::order::Order;
use super::position::{ExitReason, Position, Trade};

/// Price at which an entry signal is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillModel {
    /// Fill at the open of the bar after the signal.
    #[default]
    NextBarOpen,
    /// Fill at the close of the signal bar.
    SameBarClose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerState {
    Flat,
    PendingEntry(Order),
    Open(Position),
}

/// Largest size whose notional plus entry commission fits in `cash`.
pub fn affordable_units(cash: f64, price: f64, commission_rate: f64, fractional: bool) -> f64 {
    if cash <= 0.0 || price <= 0.0 {
        return 0.0;
    }
    let units = cash / (price * (1.0 + commission_rate));
    if fractional { units } else { units.floor() }
}

#[derive(Debug, Clone)]
pub struct Broker {
    pub cash: f64,
    pub commission_rate: f64,
    pub fractional_units: bool,
    state: BrokerState,
    rejected_orders: usize,
}

impl Broker {
    pub fn new(cash: f64, commission_rate: f64, fractional_units: bool) -> Self {
        Broker {
            cash,
            commission_rate,
            fractional_units,
            state: BrokerState::Flat,
            rejected_orders: 0,
        }
    }

    pub fn state(&self) -> &BrokerState {
        &self.state
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, BrokerState::Flat)
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.state, BrokerState::PendingEntry(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            BrokerState::Open(pos) => Some(pos),
            _ => None,
        }
    }

    pub fn rejected_orders(&self) -> usize {
        self.rejected_orders
    }

    pub fn commission(&self, notional: f64) -> f64 {
        notional * self.commission_rate
    }

    /// Queue an entry. Only accepted while flat; zero-sized orders are
    /// rejected and counted.
    pub fn submit(&mut self, order: Order) -> bool {
        if !self.is_flat() {
            return false;
        }
        if order.size <= 0.0 {
            self.reject(&order, "zero size");
            return false;
        }
        self.state = BrokerState::PendingEntry(order);
        true
    }

    /// Fill the pending order at `price`. Size is cut to what cash affords;
    /// bracket levels are re-anchored on the fill price.
    pub fn fill_pending(
        &mut self,
        price: f64,
        time: NaiveDateTime,
        index: usize,
    ) -> Option<&Position> {
        let order = match std::mem::replace(&mut self.state, BrokerState::Flat) {
            BrokerState::PendingEntry(order) => order,
            other => {
                self.state = other;
                return None;
            }
        };

        let affordable = affordable_units(
            self.cash,
            price,
            self.commission_rate,
            self.fractional_units,
        );
        let size = order.size.min(affordable);
        if size <= 0.0 {
            self.reject(&order, "unaffordable at fill");
            return None;
        }

        let notional = size * price;
        let entry_commission = self.commission(notional);
        self.cash -= notional + entry_commission;

        let (stop_loss, take_profit) = order.levels_at(price);
        tracing::debug!(
            side = %order.side,
            size,
            price,
            ?stop_loss,
            ?take_profit,
            index,
            "entry filled"
        );

        self.state = BrokerState::Open(Position {
            side: order.side,
            size,
            entry_price: price,
            entry_time: time,
            entry_index: index,
            stop_loss,
            take_profit,
            trailing_enabled: order.trailing_enabled,
            trailing_stop: None,
            entry_commission,
        });
        self.position()
    }

    /// Bracket exit triggered by this bar's range, if any. When both the stop
    /// and the target are inside the range the stop wins.
    pub fn check_brackets(&self, high: f64, low: f64) -> Option<(f64, ExitReason)> {
        let pos = self.position()?;
        if let Some(level) = pos.stop_hit(high, low) {
            let reason = if pos.trailing_is_active() {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            return Some((level, reason));
        }
        pos.target_hit(high, low)
            .map(|level| (level, ExitReason::TakeProfit))
    }

    pub fn ratchet_trailing(&mut self, candidate: f64) {
        if let BrokerState::Open(pos) = &mut self.state {
            pos.ratchet_trailing(candidate);
        }
    }

    /// Close the open position at `price`, settling cash and returning the trade.
    pub fn close(
        &mut self,
        price: f64,
        time: NaiveDateTime,
        index: usize,
        reason: ExitReason,
    ) -> Option<Trade> {
        let pos = match std::mem::replace(&mut self.state, BrokerState::Flat) {
            BrokerState::Open(pos) => pos,
            other => {
                self.state = other;
                return None;
            }
        };

        let exit_commission = self.commission(pos.notional(price));
        self.cash += pos.market_value(price) - exit_commission;

        let commission = pos.entry_commission + exit_commission;
        let pnl = pos.unrealized_pnl(price) - commission;
        let entry_notional = pos.size * pos.entry_price;
        let pnl_pct = if entry_notional > 0.0 {
            pnl / entry_notional
        } else {
            0.0
        };

        tracing::debug!(
            side = %pos.side,
            size = pos.size,
            price,
            pnl,
            %reason,
            index,
            "position closed"
        );

        Some(Trade {
            side: pos.side,
            entry_time: pos.entry_time,
            entry_price: pos.entry_price,
            exit_time: time,
            exit_price: price,
            size: pos.size,
            pnl,
            pnl_pct,
            duration_bars: pos.bars_held(index),
            commission,
            exit_reason: reason,
        })
    }

    /// Cash plus the liquidation value of the open position.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position().map_or(0.0, |p| p.market_value(price))
    }

    /// Position notional as a fraction of equity.
    pub fn exposure(&self, price: f64) -> f64 {
        let Some(pos) = self.position() else {
            return 0.0;
        };
        let equity = self.equity(price);
        if equity <= 0.0 {
            return f64::INFINITY;
        }
        pos.notional(price) / equity
    }

    fn reject(&mut self, order: &Order, reason: &str) {
        self.rejected_orders += 1;
        tracing::debug!(
            side = %order.side,
            size = order.size,
            signal_index = order.signal_index,
            reason,
            "order rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::fixtures::day;
    use crate::domain::order::{BracketSpec, Side, StopDistance, TakeProfitDistance, TrailingSpec};

    fn percent_bracket(trailing: bool) -> BracketSpec {
        BracketSpec {
            stop: Some(StopDistance::Percent(0.01)),
            take_profit: Some(TakeProfitDistance::Percent(0.06)),
            trailing: trailing.then(|| TrailingSpec {
                percent: Some(0.02),
                ..Default::default()
            }),
        }
    }

    fn long_order(size: f64) -> Order {
        Order::new(Side::Long, size, 100.0, percent_bracket(false), None, 0)
    }

    #[test]
    fn affordable_units_whole_and_fractional() {
        assert_eq!(affordable_units(1000.0, 30.0, 0.0, false), 33.0);
        let frac = affordable_units(1000.0, 30.0, 0.0, true);
        assert!((frac - 1000.0 / 30.0).abs() < 1e-12);
        assert_eq!(affordable_units(0.0, 30.0, 0.0, false), 0.0);
        // commission reserves room: 1000 / 101 = 9.9
        assert_eq!(affordable_units(1000.0, 100.0, 0.01, false), 9.0);
    }

    #[test]
    fn submit_only_when_flat() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        assert!(matches!(broker.state(), BrokerState::Flat));
        assert!(broker.submit(long_order(10.0)));
        assert!(broker.has_pending());
        assert!(matches!(broker.state(), BrokerState::PendingEntry(o) if o.size == 10.0));
        assert!(!broker.submit(long_order(10.0)));
    }

    #[test]
    fn zero_size_rejected() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        assert!(!broker.submit(long_order(0.0)));
        assert!(broker.is_flat());
        assert_eq!(broker.rejected_orders(), 1);
    }

    #[test]
    fn fill_deducts_cash_and_commission() {
        let mut broker = Broker::new(10_000.0, 0.001, false);
        broker.submit(long_order(50.0));
        let pos = broker.fill_pending(100.0, day(1), 1).cloned().unwrap();

        assert_eq!(pos.size, 50.0);
        assert_eq!(pos.stop_loss, Some(99.0));
        assert_eq!(pos.take_profit, Some(106.0));
        assert!((pos.entry_commission - 5.0).abs() < 1e-9);
        assert!((broker.cash - (10_000.0 - 5_000.0 - 5.0)).abs() < 1e-9);
        assert!((broker.equity(100.0) - 9_995.0).abs() < 1e-9);
    }

    #[test]
    fn fill_reanchors_levels_on_fill_price() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        broker.submit(long_order(10.0));
        let pos = broker.fill_pending(200.0, day(1), 1).cloned().unwrap();
        assert_eq!(pos.stop_loss, Some(198.0));
        assert_eq!(pos.take_profit, Some(212.0));
    }

    #[test]
    fn fill_caps_to_affordable() {
        let mut broker = Broker::new(1_000.0, 0.0, false);
        broker.submit(long_order(500.0));
        let pos = broker.fill_pending(100.0, day(1), 1).cloned().unwrap();
        assert_eq!(pos.size, 10.0);
        assert!(broker.cash.abs() < 1e-9);
    }

    #[test]
    fn unaffordable_fill_rejected() {
        let mut broker = Broker::new(50.0, 0.0, false);
        broker.submit(long_order(5.0));
        assert!(broker.fill_pending(100.0, day(1), 1).is_none());
        assert!(broker.is_flat());
        assert_eq!(broker.rejected_orders(), 1);
        assert_eq!(broker.cash, 50.0);
    }

    #[test]
    fn fill_without_pending_is_noop() {
        let mut broker = Broker::new(1_000.0, 0.0, false);
        assert!(broker.fill_pending(100.0, day(1), 1).is_none());
        assert_eq!(broker.rejected_orders(), 0);
    }

    #[test]
    fn stop_loss_resolves_before_take_profit() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        broker.submit(long_order(10.0));
        broker.fill_pending(100.0, day(1), 1);
        // range covers both 99 and 106
        assert_eq!(
            broker.check_brackets(107.0, 98.0),
            Some((99.0, ExitReason::StopLoss))
        );
        assert_eq!(
            broker.check_brackets(107.0, 99.5),
            Some((106.0, ExitReason::TakeProfit))
        );
        assert_eq!(broker.check_brackets(105.0, 99.5), None);
    }

    #[test]
    fn trailing_hit_reports_trailing_reason() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        let order = Order::new(Side::Long, 10.0, 100.0, percent_bracket(true), None, 0);
        broker.submit(order);
        broker.fill_pending(100.0, day(1), 1);
        broker.ratchet_trailing(103.0);
        assert_eq!(
            broker.check_brackets(104.0, 102.5),
            Some((103.0, ExitReason::TrailingStop))
        );
    }

    #[test]
    fn long_round_trip_pnl() {
        let mut broker = Broker::new(10_000.0, 0.001, false);
        broker.submit(long_order(10.0));
        broker.fill_pending(100.0, day(1), 1);
        let trade = broker.close(106.0, day(3), 3, ExitReason::TakeProfit).unwrap();

        let expected = 10.0 * 6.0 - 1.0 - 1.06;
        assert!((trade.pnl - expected).abs() < 1e-9);
        assert!((trade.pnl_pct - expected / 1000.0).abs() < 1e-12);
        assert_eq!(trade.duration_bars, 2);
        assert!((trade.commission - 2.06).abs() < 1e-9);
        assert!((broker.cash - (10_000.0 + expected)).abs() < 1e-9);
        assert!(broker.is_flat());
    }

    #[test]
    fn short_round_trip_cash_conservation() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        let order = Order::new(Side::Short, 10.0, 100.0, BracketSpec::default(), None, 0);
        broker.submit(order);
        broker.fill_pending(100.0, day(1), 1);
        assert!((broker.cash - 9_000.0).abs() < 1e-9);
        assert!((broker.equity(90.0) - 10_100.0).abs() < 1e-9);

        let trade = broker.close(90.0, day(2), 2, ExitReason::Signal).unwrap();
        assert!((trade.pnl - 100.0).abs() < 1e-9);
        assert!((broker.cash - 10_100.0).abs() < 1e-9);
    }

    #[test]
    fn exposure_is_notional_over_equity() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        assert_eq!(broker.exposure(100.0), 0.0);
        broker.submit(long_order(50.0));
        broker.fill_pending(100.0, day(1), 1);
        assert!((broker.exposure(100.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn close_when_flat_is_none() {
        let mut broker = Broker::new(10_000.0, 0.0, false);
        assert!(broker.close(100.0, day(0), 0, ExitReason::Signal).is_none());
    }
}
