//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::error::SimError;
use crate::domain::ohlcv::Bar;
use crate::domain::position::Trade;
use crate::domain::strategy::Strategy;
use crate::domain::strategy_config;
use crate::domain::sweep::{best_run, crossover_grid, Objective, RunOutcome, StopRule, Sweep, SweepRun};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DEFAULT_LOG_FILTER: &str = "simtrader=info";

#[derive(Parser, Debug)]
#[command(name = "simtrader", about = "Event-driven single-asset strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest and print its statistics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: String,
        /// Also print every closed trade
        #[arg(long)]
        trades: bool,
    },
    /// Load and validate a configuration without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Sweep crossover periods over one dataset
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: String,
        #[arg(long, value_delimiter = ',', required = true)]
        fast: Vec<usize>,
        #[arg(long, value_delimiter = ',', required = true)]
        slow: Vec<usize>,
        /// Cancel remaining runs once one scores at least this much
        #[arg(long)]
        stop_at: Option<f64>,
        #[arg(long, default_value = "total_return")]
        objective: Objective,
        #[arg(long)]
        sequential: bool,
    },
    /// Run the configured strategy over several datasets
    Batch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, required = true)]
        data: Vec<String>,
        #[arg(long)]
        sequential: bool,
    },
}

/// Install the stderr subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second call (tests driving `run` repeatedly) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging();
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            trades,
        } => run_single(&config, &data, trades),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            data,
            fast,
            slow,
            stop_at,
            objective,
            sequential,
        } => run_sweep(&config, &data, &fast, &slow, stop_at, objective, sequential),
        Command::Batch {
            config,
            data,
            sequential,
        } => run_batch(&config, &data, sequential),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<(Strategy, BacktestConfig), SimError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    let loaded = strategy_config::load(&adapter)?;
    tracing::info!(
        source = adapter.source_name(),
        strategy = %loaded.0.name,
        "configuration loaded"
    );
    Ok(loaded)
}

fn load_bars(source: &str) -> Result<Vec<Bar>, SimError> {
    CsvAdapter::new(PathBuf::new()).fetch_bars(source)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, SimError> {
    let (strategy, config) = load_config(config_path)?;

    eprintln!("Config validated successfully");
    eprintln!("\nStrategy: {} ({})", strategy.name, strategy.side);
    for predicate in &strategy.signals.entry {
        eprintln!("  entry: {} [{}]", predicate.name, predicate.spec.kind());
    }
    for predicate in &strategy.signals.exit {
        eprintln!("  exit:  {} [{}]", predicate.name, predicate.spec.kind());
    }

    let mut indicators: Vec<String> = strategy
        .required_indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    indicators.sort();
    eprintln!("\nIndicators to compute:");
    for ind in &indicators {
        eprintln!("  {}", ind);
    }
    eprintln!("\nWarm-up bars: {}", strategy.warmup_bars());
    eprintln!("Starting cash: {:.2}", config.starting_cash);
    Ok(ExitCode::SUCCESS)
}

fn run_single(config_path: &Path, data: &str, show_trades: bool) -> Result<ExitCode, SimError> {
    let (strategy, config) = load_config(config_path)?;
    let bars = load_bars(data)?;
    eprintln!("Running {} over {} bars", strategy.name, bars.len());

    let result = run_backtest(&bars, &strategy, &config)?;
    print_summary(&result, config.starting_cash);
    if show_trades {
        print_trades(&result.trades);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_sweep(
    config_path: &Path,
    data: &str,
    fasts: &[usize],
    slows: &[usize],
    stop_at: Option<f64>,
    objective: Objective,
    sequential: bool,
) -> Result<ExitCode, SimError> {
    let (strategy, config) = load_config(config_path)?;
    let bars = load_bars(data)?;

    let candidates = crossover_grid(&strategy, &config, fasts, slows);
    if candidates.is_empty() {
        return Err(SimError::invalid(
            "sweep",
            "fast",
            "no fast/slow pair with fast < slow",
        ));
    }
    eprintln!(
        "Sweeping {} combinations over {} bars",
        candidates.len(),
        bars.len()
    );

    let mut sweep = Sweep::new().with_parallelism(!sequential);
    if let Some(threshold) = stop_at {
        sweep = sweep.with_stop_rule(StopRule {
            objective,
            threshold,
        });
    }
    let runs = sweep.run(&bars, &candidates);

    print_runs(&runs, objective);
    if let Some(best) = best_run(&runs, objective) {
        eprintln!("\nBest by {}: {}", objective, best.label);
    }
    Ok(batch_exit_code(&runs))
}

fn run_batch(config_path: &Path, sources: &[String], sequential: bool) -> Result<ExitCode, SimError> {
    let (strategy, config) = load_config(config_path)?;

    let mut datasets = Vec::with_capacity(sources.len());
    let mut slots: Vec<Option<SweepRun>> = Vec::with_capacity(sources.len());
    for source in sources {
        match load_bars(source) {
            Ok(bars) => {
                datasets.push((source.clone(), bars));
                slots.push(None);
            }
            Err(e) => {
                tracing::warn!(dataset = %source, error = %e, "dataset failed to load");
                slots.push(Some(SweepRun {
                    label: source.clone(),
                    outcome: RunOutcome::Failed(e),
                }));
            }
        }
    }

    let completed = Sweep::new()
        .with_parallelism(!sequential)
        .run_datasets(&datasets, &strategy, &config);
    let runs = merge_in_order(slots, completed);

    print_runs(&runs, Objective::TotalReturn);
    Ok(batch_exit_code(&runs))
}

/// Fills the empty slots with dataset runs so the report follows `-d` order.
fn merge_in_order(slots: Vec<Option<SweepRun>>, runs: Vec<SweepRun>) -> Vec<SweepRun> {
    let mut runs = runs.into_iter();
    slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| runs.next()))
        .collect()
}

/// Success while at least one run completed; otherwise the first failure's
/// code.
fn batch_exit_code(runs: &[SweepRun]) -> ExitCode {
    if runs.iter().any(|r| r.result().is_some()) {
        return ExitCode::SUCCESS;
    }
    runs.iter()
        .find_map(|r| match &r.outcome {
            RunOutcome::Failed(e) => Some(ExitCode::from(e)),
            _ => None,
        })
        .unwrap_or(ExitCode::SUCCESS)
}

fn print_summary(result: &BacktestResult, starting_cash: f64) {
    let s = &result.statistics;
    eprintln!("\n=== {} ===", result.strategy_name);
    eprintln!("Starting Cash:    {:.2}", starting_cash);
    eprintln!("Final Equity:     {:.2}", result.final_equity);
    eprintln!("Total Return:     {:.2}%", s.total_return_pct);
    eprintln!("Buy & Hold:       {:.2}%", s.benchmark_return_pct);
    eprintln!("Annualized:       {:.2}%", s.annualized_return_pct);
    eprintln!("Sharpe Ratio:     {:.2}", s.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", s.sortino_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} bars)",
        s.max_drawdown_pct, s.max_drawdown_duration
    );
    eprintln!(
        "Total Trades:     {} ({} won, {} lost, {} even)",
        s.total_trades, s.trades_won, s.trades_lost, s.trades_breakeven
    );
    eprintln!("Win Rate:         {:.1}%", s.win_rate_pct);
    eprintln!("Avg Trade:        {:.2}%", s.avg_trade_pct);
    eprintln!("Profit Factor:    {:.2}", s.profit_factor);
    eprintln!("Expectancy:       {:.2}", s.expectancy);
    eprintln!("Avg Win / Loss:   {:.2} / {:.2}", s.avg_win, s.avg_loss);
    eprintln!("Avg Duration:     {:.1} bars", s.avg_duration_bars);
    eprintln!("Commission:       {:.2}", s.total_commission);
    eprintln!("Warm-up Bars:     {}", result.warmup_bars);
    if result.rejected_orders > 0 {
        eprintln!("Rejected Orders:  {}", result.rejected_orders);
    }
    if let Some(position) = &result.open_position {
        eprintln!(
            "Open Position:    {} {:.4} @ {:.4}",
            position.side, position.size, position.entry_price
        );
    }
}

fn print_trades(trades: &[Trade]) {
    eprintln!("\n=== Trades ===");
    for (i, t) in trades.iter().enumerate() {
        let pnl_sign = if t.pnl >= 0.0 { "+" } else { "" };
        eprintln!(
            "{:>4}  {:<5} {} @ {:.4} -> {} @ {:.4}  size {:.4}  {}{:.2} ({:.2}%)  {} bars  {}",
            i + 1,
            t.side,
            t.entry_time,
            t.entry_price,
            t.exit_time,
            t.exit_price,
            t.size,
            pnl_sign,
            t.pnl,
            t.pnl_pct * 100.0,
            t.duration_bars,
            t.exit_reason,
        );
    }
}

fn print_runs(runs: &[SweepRun], objective: Objective) {
    eprintln!("\n=== Runs ===");
    for run in runs {
        match &run.outcome {
            RunOutcome::Completed(result) => eprintln!(
                "  {:<24} {:>4} trades  return {:>8.2}%  sharpe {:>6.2}  {} {:.2}",
                run.label,
                result.statistics.total_trades,
                result.statistics.total_return_pct,
                result.statistics.sharpe_ratio,
                objective,
                objective.score(&result.statistics),
            ),
            RunOutcome::Failed(e) => eprintln!("  {:<24} FAILED: {}", run.label, e),
            RunOutcome::Cancelled => eprintln!("  {:<24} cancelled", run.label),
        }
    }
}
