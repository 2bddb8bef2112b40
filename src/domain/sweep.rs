//! Batch and parameter-sweep execution.
//!
//! Every run owns its engine and shares only the immutable bar slice, so runs
//! are independent and may execute on the rayon pool. A failing run is
//! captured in its [`RunOutcome`] and never affects siblings. An optional
//! [`StopRule`] cancels runs that have not started once any completed run
//! meets it; a run in progress always finishes.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::error::SimError;
use crate::domain::metrics::Statistics;
use crate::domain::ohlcv::Bar;
use crate::domain::strategy::Strategy;

/// One parameter combination to run.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub strategy: Strategy,
    pub config: BacktestConfig,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(BacktestResult),
    Failed(SimError),
    /// Skipped because a stop rule fired first.
    Cancelled,
}

#[derive(Debug)]
pub struct SweepRun {
    pub label: String,
    pub outcome: RunOutcome,
}

impl SweepRun {
    pub fn result(&self) -> Option<&BacktestResult> {
        match &self.outcome {
            RunOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    TotalReturn,
    Sharpe,
    ProfitFactor,
    Expectancy,
}

impl Objective {
    pub fn score(self, stats: &Statistics) -> f64 {
        match self {
            Objective::TotalReturn => stats.total_return_pct,
            Objective::Sharpe => stats.sharpe_ratio,
            Objective::ProfitFactor => stats.profit_factor,
            Objective::Expectancy => stats.expectancy,
        }
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "total_return" | "return" => Ok(Objective::TotalReturn),
            "sharpe" => Ok(Objective::Sharpe),
            "profit_factor" => Ok(Objective::ProfitFactor),
            "expectancy" => Ok(Objective::Expectancy),
            other => Err(format!("unknown objective '{}'", other)),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Objective::TotalReturn => "total_return",
            Objective::Sharpe => "sharpe",
            Objective::ProfitFactor => "profit_factor",
            Objective::Expectancy => "expectancy",
        };
        f.write_str(name)
    }
}

/// Stop the sweep once a completed run scores at least `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRule {
    pub objective: Objective,
    pub threshold: f64,
}

impl StopRule {
    pub fn is_met(&self, result: &BacktestResult) -> bool {
        self.objective.score(&result.statistics) >= self.threshold
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sweep {
    parallel: bool,
    stop_rule: Option<StopRule>,
}

impl Default for Sweep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweep {
    pub fn new() -> Self {
        Self {
            parallel: true,
            stop_rule: None,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_stop_rule(mut self, rule: StopRule) -> Self {
        self.stop_rule = Some(rule);
        self
    }

    /// Run every candidate over `bars`. Outcomes come back in candidate order.
    pub fn run(&self, bars: &[Bar], candidates: &[Candidate]) -> Vec<SweepRun> {
        let stop = AtomicBool::new(false);
        let job = |candidate: &Candidate| {
            self.execute(
                &candidate.label,
                bars,
                &candidate.strategy,
                &candidate.config,
                &stop,
            )
        };

        let runs: Vec<SweepRun> = if self.parallel {
            candidates.par_iter().map(job).collect()
        } else {
            candidates.iter().map(job).collect()
        };
        log_summary(&runs);
        runs
    }

    /// Run one strategy over several named datasets.
    pub fn run_datasets(
        &self,
        datasets: &[(String, Vec<Bar>)],
        strategy: &Strategy,
        config: &BacktestConfig,
    ) -> Vec<SweepRun> {
        let stop = AtomicBool::new(false);
        let job = |(name, bars): &(String, Vec<Bar>)| {
            self.execute(name, bars, strategy, config, &stop)
        };

        let runs: Vec<SweepRun> = if self.parallel {
            datasets.par_iter().map(job).collect()
        } else {
            datasets.iter().map(job).collect()
        };
        log_summary(&runs);
        runs
    }

    fn execute(
        &self,
        label: &str,
        bars: &[Bar],
        strategy: &Strategy,
        config: &BacktestConfig,
        stop: &AtomicBool,
    ) -> SweepRun {
        let label = label.to_string();
        if stop.load(Ordering::Acquire) {
            tracing::debug!(run = %label, "run cancelled by stop rule");
            return SweepRun {
                label,
                outcome: RunOutcome::Cancelled,
            };
        }

        let outcome = match run_backtest(bars, strategy, config) {
            Ok(result) => {
                if let Some(rule) = &self.stop_rule {
                    if rule.is_met(&result) {
                        tracing::info!(
                            run = %label,
                            objective = %rule.objective,
                            threshold = rule.threshold,
                            "stop rule met"
                        );
                        stop.store(true, Ordering::Release);
                    }
                }
                RunOutcome::Completed(result)
            }
            Err(err) => {
                tracing::warn!(run = %label, error = %err, "run failed");
                RunOutcome::Failed(err)
            }
        };
        SweepRun { label, outcome }
    }
}

fn log_summary(runs: &[SweepRun]) {
    let (mut completed, mut failed, mut cancelled) = (0usize, 0usize, 0usize);
    for run in runs {
        match run.outcome {
            RunOutcome::Completed(_) => completed += 1,
            RunOutcome::Failed(_) => failed += 1,
            RunOutcome::Cancelled => cancelled += 1,
        }
    }
    tracing::info!(completed, failed, cancelled, "sweep finished");
}

/// Completed run with the highest score; ties keep the earliest.
pub fn best_run(runs: &[SweepRun], objective: Objective) -> Option<&SweepRun> {
    runs.iter()
        .filter_map(|run| run.result().map(|r| (run, objective.score(&r.statistics))))
        .fold(None, |best: Option<(&SweepRun, f64)>, (run, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((run, score)),
        })
        .map(|(run, _)| run)
}

/// Candidates for every `fast < slow` pair, rewriting the crossover periods of
/// `base`.
pub fn crossover_grid(
    base: &Strategy,
    config: &BacktestConfig,
    fasts: &[usize],
    slows: &[usize],
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for &fast in fasts {
        for &slow in slows {
            if fast >= slow {
                continue;
            }
            candidates.push(Candidate {
                label: format!("fast={} slow={}", fast, slow),
                strategy: base.with_crossover_periods(fast, slow),
                config: config.clone(),
            });
        }
    }
    candidates
}
