//! CLI integration tests with real INI and CSV files on disk.
//!
//! Tests cover:
//! - Config loading through the INI adapter (strategy_config::load)
//! - The validate, backtest, sweep and batch commands
//! - Exit codes for configuration, data and I/O failures

mod common;

use clap::Parser;
use common::*;
use simtrader::adapters::csv_adapter::CsvAdapter;
use simtrader::adapters::file_config_adapter::FileConfigAdapter;
use simtrader::cli::{self, Cli};
use simtrader::domain::backtest::run_backtest;
use simtrader::domain::broker::FillModel;
use simtrader::domain::error::SimError;
use simtrader::domain::order::{Side, StopDistance, TakeProfitDistance};
use simtrader::domain::predicate::PredicateSpec;
use simtrader::domain::signal::ExitMode;
use simtrader::domain::sizing::SizingMode;
use simtrader::domain::strategy_config;
use simtrader::ports::data_port::DataPort;
use std::process::ExitCode;

const VALID_INI: &str = r#"
[backtest]
starting_cash = 100000
commission_rate = 0.001          ; proportional, applied to entry & exit notional
fill_model = next_bar_open
exposure_ceiling = 0.95
fractional_units = false
close_at_end = true
periods_per_year = 252
risk_free_rate = 0.0

[strategy]
name = SMA cross
side = long
entry = golden_cross
exit = death_cross
exit_mode = any
max_hold_bars = 40
sizing = fixed_fractional
risk_fraction = 0.01
stop_loss_pct = 0.05
take_profit_pct = 0.15
trail_pct = 0.08

[golden_cross]
kind = crossover
fast = sma:3
slow = sma:8
direction = above

[death_cross]
kind = crossover
fast = sma:3
slow = sma:8
direction = below
"#;

fn exit_code_is(actual: ExitCode, expected: ExitCode) -> bool {
    format!("{actual:?}") == format!("{expected:?}")
}

fn run_cli(args: &[&str]) -> ExitCode {
    let mut argv = vec!["simtrader"];
    argv.extend_from_slice(args);
    cli::run(Cli::parse_from(argv))
}

fn wave_csv() -> tempfile::NamedTempFile {
    write_temp_file(&bars_to_csv(&path_bars(&wave_closes(200))), ".csv")
}

mod config_loading {
    use super::*;

    #[test]
    fn full_ini_loads_typed_values() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let (strategy, config) = strategy_config::load(&adapter).unwrap();

        assert_eq!(config.starting_cash, 100_000.0);
        assert_eq!(config.commission_rate, 0.001);
        assert_eq!(config.fill_model, FillModel::NextBarOpen);
        assert_eq!(config.exposure_ceiling, Some(0.95));
        assert!(config.close_at_end);

        assert_eq!(strategy.name, "SMA cross");
        assert_eq!(strategy.side, Side::Long);
        assert_eq!(strategy.signals.exit_mode, ExitMode::Any);
        assert!(matches!(
            strategy.signals.entry[0].spec,
            PredicateSpec::Crossover { .. }
        ));
        assert_eq!(
            strategy.sizing,
            SizingMode::FixedFractional {
                risk_fraction: 0.01
            }
        );
        assert_eq!(strategy.bracket.stop, Some(StopDistance::Percent(0.05)));
        assert_eq!(
            strategy.bracket.take_profit,
            Some(TakeProfitDistance::Percent(0.15))
        );
        assert_eq!(strategy.bracket.trailing.unwrap().percent, Some(0.08));
        assert_eq!(strategy.max_hold_bars, Some(40));
    }

    #[test]
    fn contradictory_values_are_configuration_errors() {
        let ini = VALID_INI.replace("slow = sma:8", "slow = sma:2");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let err = strategy_config::load(&adapter).unwrap_err();
        assert!(err.is_configuration());

        let ini = VALID_INI.replace("risk_fraction = 0.01", "risk_fraction = a lot");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        match strategy_config::load(&adapter) {
            Err(SimError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "strategy");
                assert_eq!(key, "risk_fraction");
            }
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn csv_round_trip_feeds_engine() {
        let bars = path_bars(&wave_closes(120));
        let file = write_temp_file(&bars_to_csv(&bars), ".csv");
        let adapter = CsvAdapter::new(file.path().parent().unwrap().to_path_buf());
        let name = file.path().file_name().unwrap().to_str().unwrap();
        let loaded = adapter.fetch_bars(name).unwrap();
        assert_eq!(loaded, bars);

        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let (strategy, backtest) = strategy_config::load(&config).unwrap();
        let from_file = run_backtest(&loaded, &strategy, &backtest).unwrap();
        let in_memory = run_backtest(&bars, &strategy, &backtest).unwrap();
        assert_eq!(from_file, in_memory);
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_accepts_valid_config() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let code = run_cli(&["validate", "-c", ini.path().to_str().unwrap()]);
        assert!(exit_code_is(code, ExitCode::SUCCESS));
    }

    #[test]
    fn validate_rejects_bad_config_with_code_2() {
        let ini = write_temp_file(&VALID_INI.replace("side = long", "side = both"), ".ini");
        let code = run_cli(&["validate", "-c", ini.path().to_str().unwrap()]);
        assert!(exit_code_is(code, ExitCode::from(2)));
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let code = run_cli(&["validate", "-c", "/nonexistent/path/config.ini"]);
        assert!(exit_code_is(code, ExitCode::from(1)));
    }

    #[test]
    fn backtest_runs_over_csv() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let csv = wave_csv();
        let code = run_cli(&[
            "backtest",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            csv.path().to_str().unwrap(),
            "--trades",
        ]);
        assert!(exit_code_is(code, ExitCode::SUCCESS));
    }

    #[test]
    fn backtest_with_bad_rows_is_data_error() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let csv = write_temp_file(
            "timestamp,open,high,low,close,volume\n\
             2024-01-02,10,11,9,10,100\n\
             2024-01-01,10,11,9,10,100\n",
            ".csv",
        );
        let code = run_cli(&[
            "backtest",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            csv.path().to_str().unwrap(),
        ]);
        assert!(exit_code_is(code, ExitCode::from(5)));
    }

    #[test]
    fn sweep_over_grid() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let csv = wave_csv();
        let code = run_cli(&[
            "sweep",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            csv.path().to_str().unwrap(),
            "--fast",
            "3,5",
            "--slow",
            "8,13",
            "--stop-at",
            "1000",
            "--objective",
            "sharpe",
        ]);
        assert!(exit_code_is(code, ExitCode::SUCCESS));
    }

    #[test]
    fn sweep_without_valid_pairs_fails() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let csv = wave_csv();
        let code = run_cli(&[
            "sweep",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            csv.path().to_str().unwrap(),
            "--fast",
            "20",
            "--slow",
            "10",
        ]);
        assert!(exit_code_is(code, ExitCode::from(2)));
    }

    #[test]
    fn batch_survives_one_bad_dataset() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let good = wave_csv();
        let code = run_cli(&[
            "batch",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            good.path().to_str().unwrap(),
            "-d",
            "/nonexistent/bars.csv",
            "--sequential",
        ]);
        assert!(exit_code_is(code, ExitCode::SUCCESS));
    }

    #[test]
    fn batch_with_only_bad_datasets_fails() {
        let ini = write_temp_file(VALID_INI, ".ini");
        let empty = write_temp_file("timestamp,open,high,low,close,volume\n", ".csv");
        let code = run_cli(&[
            "batch",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            empty.path().to_str().unwrap(),
        ]);
        assert!(exit_code_is(code, ExitCode::from(5)));
    }
}
