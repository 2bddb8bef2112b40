//! Post-run performance statistics, derived only from the ledger and the
//! equity curve. Returns and rates are expressed in percent.

use super::ledger::EquityPoint;
use super::position::Trade;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticsParams {
    pub starting_cash: f64,
    pub periods_per_year: f64,
    /// Annual rate, as a fraction.
    pub risk_free_rate: f64,
    /// First and last close of the replayed bars, for buy-and-hold.
    pub benchmark: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total_return_pct: f64,
    pub benchmark_return_pct: f64,
    pub annualized_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate_pct: f64,
    pub avg_trade_pct: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_duration_bars: f64,
    pub total_commission: f64,
}

impl Statistics {
    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], params: &StatisticsParams) -> Self {
        let initial = params.starting_cash;
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(initial);

        let total_return = if initial > 0.0 {
            (final_equity - initial) / initial
        } else {
            0.0
        };

        let benchmark_return = match params.benchmark {
            Some((first, last)) if first > 0.0 => (last - first) / first,
            _ => 0.0,
        };

        let years = equity_curve.len() as f64 / params.periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let period_rf = params.risk_free_rate / params.periods_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, period_rf, params.periods_per_year);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration = 0usize;
        let mut total_pct = 0.0_f64;
        let mut total_commission = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_duration += trade.duration_bars;
            total_pct += trade.pnl_pct;
            total_commission += trade.commission;
        }

        let total_trades = trades.len();
        let ratio = |count: usize| {
            if total_trades > 0 {
                count as f64 / total_trades as f64
            } else {
                0.0
            }
        };
        let win_rate = ratio(trades_won);
        let loss_rate = ratio(trades_lost);

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let (avg_trade_pct, avg_duration_bars) = if total_trades > 0 {
            (
                total_pct / total_trades as f64 * 100.0,
                total_duration as f64 / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Statistics {
            total_return_pct: total_return * 100.0,
            benchmark_return_pct: benchmark_return * 100.0,
            annualized_return_pct: annualized_return * 100.0,
            max_drawdown_pct: max_drawdown * 100.0,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate_pct: win_rate * 100.0,
            avg_trade_pct,
            profit_factor,
            expectancy: win_rate * avg_win - loss_rate * avg_loss,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_duration_bars,
            total_commission,
        }
    }
}

/// Largest peak-to-trough decline (fraction of peak) and the longest run of
/// bars spent below a prior peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(
    equity_curve: &[EquityPoint],
    period_rf: f64,
    periods_per_year: f64,
) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let annualize = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * annualize
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * annualize
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::fixtures::day;
    use crate::domain::order::Side;
    use crate::domain::position::ExitReason;
    use approx::assert_relative_eq;

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: day(i),
                cash: v,
                position_value: 0.0,
                equity: v,
            })
            .collect()
    }

    fn make_trade(pnl: f64, bars: usize) -> Trade {
        Trade {
            side: Side::Long,
            entry_time: day(0),
            entry_price: 100.0,
            exit_time: day(bars),
            exit_price: 100.0 + pnl / 100.0,
            size: 100.0,
            pnl,
            pnl_pct: pnl / 10_000.0,
            duration_bars: bars,
            commission: 1.0,
            exit_reason: ExitReason::Signal,
        }
    }

    fn params(starting_cash: f64) -> StatisticsParams {
        StatisticsParams {
            starting_cash,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
            benchmark: None,
        }
    }

    #[test]
    fn empty_run() {
        let stats = Statistics::compute(&[], &[], &params(100_000.0));
        assert_eq!(stats.total_return_pct, 0.0);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.profit_factor, 0.0);
        assert_eq!(stats.expectancy, 0.0);
    }

    #[test]
    fn total_and_benchmark_return_in_percent() {
        let curve = make_equity_curve(&[100_000.0, 110_000.0]);
        let stats = Statistics::compute(
            &[],
            &curve,
            &StatisticsParams {
                benchmark: Some((50.0, 40.0)),
                ..params(100_000.0)
            },
        );
        assert_relative_eq!(stats.total_return_pct, 10.0, epsilon = 1e-9);
        assert_relative_eq!(stats.benchmark_return_pct, -20.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_year_has_zero_annualized_return() {
        let curve = make_equity_curve(&vec![100_000.0; 252]);
        let stats = Statistics::compute(&[], &curve, &params(100_000.0));
        assert_relative_eq!(stats.annualized_return_pct, 0.0, epsilon = 1e-9);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.max_drawdown_pct, 0.0);
    }

    #[test]
    fn trade_counts_and_rates() {
        let trades = vec![
            make_trade(100.0, 5),
            make_trade(-50.0, 3),
            make_trade(200.0, 10),
            make_trade(0.0, 2),
        ];
        let stats = Statistics::compute(&trades, &[], &params(100_000.0));

        assert_eq!(stats.trades_won, 2);
        assert_eq!(stats.trades_lost, 1);
        assert_eq!(stats.trades_breakeven, 1);
        assert_relative_eq!(stats.win_rate_pct, 50.0);
        assert_relative_eq!(stats.profit_factor, 6.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_win, 150.0, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_loss, 50.0, epsilon = 1e-9);
        // 0.5 * 150 - 0.25 * 50
        assert_relative_eq!(stats.expectancy, 62.5, epsilon = 1e-9);
        assert_relative_eq!(stats.avg_duration_bars, 5.0, epsilon = 1e-9);
        assert_relative_eq!(stats.total_commission, 4.0, epsilon = 1e-9);
        // mean pnl_pct = 250 / 4 / 10_000
        assert_relative_eq!(stats.avg_trade_pct, 0.625, epsilon = 1e-9);
    }

    #[test]
    fn largest_win_and_loss() {
        let trades = vec![
            make_trade(100.0, 1),
            make_trade(300.0, 1),
            make_trade(-50.0, 1),
            make_trade(-150.0, 1),
        ];
        let stats = Statistics::compute(&trades, &[], &params(100_000.0));
        assert_relative_eq!(stats.largest_win, 300.0);
        assert_relative_eq!(stats.largest_loss, 150.0);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let stats = Statistics::compute(&[make_trade(10.0, 1)], &[], &params(100_000.0));
        assert!(stats.profit_factor.is_infinite());
    }

    #[test]
    fn max_drawdown() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let (dd, _) = compute_drawdown(&curve);
        assert_relative_eq!(dd, 30.0 / 110.0, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_duration() {
        let curve = make_equity_curve(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0]);
        let (_, duration) = compute_drawdown(&curve);
        assert_eq!(duration, 4);
    }

    #[test]
    fn sharpe_positive_for_rising_curve() {
        let values: Vec<f64> = (0..253)
            .map(|i| 100_000.0 * (1.0 + 0.001 * i as f64))
            .collect();
        let stats = Statistics::compute(&[], &make_equity_curve(&values), &params(100_000.0));
        assert!(stats.sharpe_ratio > 0.0);
        // no down periods
        assert_eq!(stats.sortino_ratio, 0.0);
    }

    #[test]
    fn sortino_finite_with_down_periods() {
        let curve = make_equity_curve(&[100.0, 101.0, 100.5, 101.5, 100.0, 102.0]);
        let (sharpe, sortino) = compute_risk_adjusted(&curve, 0.0, 252.0);
        assert!(sharpe.is_finite());
        assert!(sortino.is_finite());
        assert!(sortino > 0.0);
    }
}
