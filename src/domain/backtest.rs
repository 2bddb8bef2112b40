//! Backtest engine and event loop.
//!
//! Per bar, in order:
//! 1. fill a pending entry at the open
//! 2. for an open position: exposure breaker, bracket exits (stop before
//!    target), max-hold, exit signal, then the trailing-stop ratchet
//! 3. when flat and nothing closed this bar: entry signal, sizing, order
//! 4. on the last bar, optionally close out at the close
//! 5. record equity at the close

use crate::domain::broker::{Broker, FillModel};
use crate::domain::config_validation::{validate_backtest_config, validate_strategy};
use crate::domain::error::SimError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ledger::{EquityCurve, TradeLedger};
use crate::domain::metrics::{Statistics, StatisticsParams};
use crate::domain::ohlcv::{validate_bars, Bar};
use crate::domain::order::Order;
use crate::domain::position::{ExitReason, Position, Trade};
use crate::domain::sizing::{PositionSizer, SizingInput};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub starting_cash: f64,
    /// Proportional rate charged on entry and exit notional.
    pub commission_rate: f64,
    pub fill_model: FillModel,
    /// Force-close when position notional / equity exceeds this.
    pub exposure_ceiling: Option<f64>,
    pub fractional_units: bool,
    pub close_at_end: bool,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            starting_cash: 100_000.0,
            commission_rate: 0.0,
            fill_model: FillModel::NextBarOpen,
            exposure_ceiling: None,
            fractional_units: false,
            close_at_end: true,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub statistics: Statistics,
    pub final_cash: f64,
    pub final_equity: f64,
    /// Position still open after the last bar (only without `close_at_end`).
    pub open_position: Option<Position>,
    /// Leading bars on which no entry could be taken.
    pub warmup_bars: usize,
    /// Orders sized to zero or unaffordable at fill.
    pub rejected_orders: usize,
}

/// Validate inputs and replay `bars` through `strategy`.
pub fn run_backtest(
    bars: &[Bar],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, SimError> {
    validate_backtest_config(config)?;
    validate_strategy(strategy)?;
    validate_bars(bars, &strategy.name)?;

    tracing::info!(
        strategy = %strategy.name,
        bars = bars.len(),
        side = %strategy.side,
        "backtest started"
    );

    let result = Engine::new(bars, strategy, config).run();

    tracing::info!(
        strategy = %strategy.name,
        trades = result.trades.len(),
        final_equity = result.final_equity,
        total_return_pct = result.statistics.total_return_pct,
        "backtest finished"
    );
    Ok(result)
}

/// One run's private state. Nothing here is shared between runs.
struct Engine<'a> {
    bars: &'a [Bar],
    strategy: &'a Strategy,
    config: &'a BacktestConfig,
    indicators: IndicatorSet,
    sizer: PositionSizer,
    broker: Broker,
    ledger: TradeLedger,
    equity_curve: EquityCurve,
    warmup: usize,
}

impl<'a> Engine<'a> {
    fn new(bars: &'a [Bar], strategy: &'a Strategy, config: &'a BacktestConfig) -> Self {
        Engine {
            bars,
            strategy,
            config,
            indicators: IndicatorSet::compute(bars, strategy.required_indicators()),
            sizer: PositionSizer::new(strategy.sizing, config.fractional_units),
            broker: Broker::new(
                config.starting_cash,
                config.commission_rate,
                config.fractional_units,
            ),
            ledger: TradeLedger::new(),
            equity_curve: EquityCurve::with_capacity(bars.len()),
            warmup: strategy.warmup_bars(),
        }
    }

    fn run(mut self) -> BacktestResult {
        for index in 0..self.bars.len() {
            self.step(index);
        }

        let statistics = Statistics::compute(
            self.ledger.trades(),
            self.equity_curve.points(),
            &StatisticsParams {
                starting_cash: self.config.starting_cash,
                periods_per_year: self.config.periods_per_year,
                risk_free_rate: self.config.risk_free_rate,
                benchmark: self
                    .bars
                    .first()
                    .zip(self.bars.last())
                    .map(|(first, last)| (first.close, last.close)),
            },
        );
        let final_equity = self
            .equity_curve
            .last()
            .map_or(self.broker.cash, |p| p.equity);

        BacktestResult {
            strategy_name: self.strategy.name.clone(),
            open_position: self.broker.position().cloned(),
            final_cash: self.broker.cash,
            final_equity,
            warmup_bars: self.warmup,
            rejected_orders: self.broker.rejected_orders(),
            statistics,
            equity_curve: self.equity_curve,
            trades: self.ledger.into_trades(),
        }
    }

    fn step(&mut self, index: usize) {
        let bars = self.bars;
        let bar = &bars[index];

        if self.broker.has_pending() {
            self.broker.fill_pending(bar.open, bar.timestamp, index);
        }

        let closed = match self.broker.position() {
            Some(_) => self.manage_open_position(index),
            None => false,
        };

        if self.broker.is_flat() && !closed && index >= self.warmup {
            self.try_enter(index);
        }

        let is_last = index + 1 == self.bars.len();
        if is_last && self.config.close_at_end {
            self.close(index, bar.close, ExitReason::EndOfData);
        }

        let position_value = self
            .broker
            .position()
            .map_or(0.0, |p| p.market_value(bar.close));
        self.equity_curve
            .record(bar.timestamp, self.broker.cash, position_value);
    }

    /// Returns true if the position was closed on this bar.
    fn manage_open_position(&mut self, index: usize) -> bool {
        let bars = self.bars;
        let bar = &bars[index];
        let Some(pos) = self.broker.position() else {
            return false;
        };
        let entry_index = pos.entry_index;
        let bars_held = pos.bars_held(index);
        let side = pos.side;

        if let Some(ceiling) = self.config.exposure_ceiling {
            if entry_index < index && self.broker.exposure(bar.open) > ceiling {
                return self.close(index, bar.open, ExitReason::ExposureLimit);
            }
        }

        if let Some((level, reason)) = self.broker.check_brackets(bar.high, bar.low) {
            return self.close(index, level, reason);
        }

        if self
            .strategy
            .max_hold_bars
            .is_some_and(|limit| bars_held > limit)
        {
            return self.close(index, bar.close, ExitReason::MaxHold);
        }

        if self
            .strategy
            .signals
            .should_exit(self.bars, &self.indicators, index)
        {
            return self.close(index, bar.close, ExitReason::Signal);
        }

        if let Some(trailing) = self.strategy.bracket.trailing {
            let atr = self
                .strategy
                .trailing_atr()
                .and_then(|kind| self.indicators.value(kind, index));
            let channel_mid = self
                .strategy
                .trailing_channel()
                .and_then(|kind| self.indicators.value(kind, index));
            if let Some(candidate) = trailing.candidate(side, bar.high, bar.low, atr, channel_mid) {
                self.broker.ratchet_trailing(candidate);
            }
        }
        false
    }

    fn try_enter(&mut self, index: usize) {
        let bars = self.bars;
        let bar = &bars[index];
        let is_last = index + 1 == self.bars.len();
        if self.config.fill_model == FillModel::NextBarOpen && is_last {
            return;
        }
        if !self
            .strategy
            .signals
            .should_enter(self.bars, &self.indicators, index)
        {
            return;
        }

        let reference_price = bar.close;
        let stop_atr = self
            .strategy
            .stop_atr()
            .and_then(|kind| self.indicators.value(kind, index));
        let Some(distances) = self.strategy.bracket.distances(reference_price, stop_atr) else {
            tracing::debug!(index, "entry skipped: stop ATR undefined");
            return;
        };

        let input = SizingInput {
            equity: self.broker.equity(bar.close),
            cash: self.broker.cash,
            entry_price: reference_price,
            stop_distance: distances.stop,
            commission_rate: self.config.commission_rate,
        };
        let history = self.ledger.recent(self.sizer.history_window());
        let size = self.sizer.size(&input, history);

        let order = Order::new(
            self.strategy.side,
            size,
            reference_price,
            self.strategy.bracket,
            stop_atr,
            index,
        );
        if self.broker.submit(order) && self.config.fill_model == FillModel::SameBarClose {
            self.broker.fill_pending(bar.close, bar.timestamp, index);
        }
    }

    fn close(&mut self, index: usize, price: f64, reason: ExitReason) -> bool {
        let timestamp = self.bars[index].timestamp;
        match self.broker.close(price, timestamp, index, reason) {
            Some(trade) => {
                self.ledger.record(trade);
                true
            }
            None => false,
        }
    }
}
