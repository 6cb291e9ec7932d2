//! CLI integration tests.
//!
//! Tests cover:
//! - Settings built from INI files (engine, catalog, scheduler, gateway)
//! - Path resolution relative to the config file
//! - Signal file validation
//! - Subcommand dispatch and exit codes with real files on disk

use chrono::TimeDelta;
use clap::Parser;
use signal_trader::adapters::csv_signal_adapter::CsvSignalAdapter;
use signal_trader::adapters::file_config_adapter::FileConfigAdapter;
use signal_trader::cli::{self, Cli};
use signal_trader::domain::error::TraderError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

const HEADER: &str =
    "Magic Number;Month;Symbol;Entry;TP;SL;SL Type;Risk;Direction;Type;Open Time;Close Time\n";

const VALID_INI: &str = r#"
[engine]
signals_file = signals.csv
interval_seconds = 2
tick_budget_seconds = 10
deviation = 15
order_comment = nightly
open_grace_minutes = 30
heartbeat_evaluations = 6
history_lookback_days = 90
history_lookahead_days = 1
sizing_backoff_seconds = 120

[broker]
kind = paper

[paper]
equity = 5000

[symbol.EURUSD]
point = 0.00001
digits = 5
ask = 1.10010
bid = 1.10000
volume_min = 0.01
tick_value = 1
tick_size = 0.00001
"#;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

// ===========================================================================
// Settings
// ===========================================================================

mod settings {
    use super::*;

    #[test]
    fn engine_keys_are_read() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();

        let eval = cli::build_eval_settings(&config);
        assert_eq!(eval.open_grace, TimeDelta::minutes(30));
        assert_eq!(eval.heartbeat, 6);
        assert_eq!(eval.sizing_backoff, TimeDelta::seconds(120));

        let catalog = cli::build_catalog_settings(&config);
        assert_eq!(catalog.history_lookback, TimeDelta::days(90));
        assert_eq!(catalog.history_lookahead, TimeDelta::days(1));
        assert_eq!(catalog.eval, eval);

        let scheduler = cli::build_scheduler_config(&config);
        assert_eq!(scheduler.interval, Duration::from_secs(2));
        assert_eq!(scheduler.tick_budget, Duration::from_secs(10));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = FileConfigAdapter::from_string("[engine]\nsignals_file = s.csv\n").unwrap();

        let eval = cli::build_eval_settings(&config);
        assert_eq!(eval.open_grace, TimeDelta::minutes(60));
        assert_eq!(eval.heartbeat, 12);
        assert_eq!(eval.sizing_backoff, TimeDelta::seconds(60));

        let catalog = cli::build_catalog_settings(&config);
        assert_eq!(catalog.history_lookback, TimeDelta::days(365));
        assert_eq!(catalog.history_lookahead, TimeDelta::days(2));

        let scheduler = cli::build_scheduler_config(&config);
        assert_eq!(scheduler.interval, Duration::from_secs(5));
        assert_eq!(scheduler.tick_budget, Duration::from_secs(30));
    }

    #[test]
    fn heartbeat_is_at_least_one() {
        let config = FileConfigAdapter::from_string("[engine]\nheartbeat_evaluations = 0\n").unwrap();
        assert_eq!(cli::build_eval_settings(&config).heartbeat, 1);
    }

    #[test]
    fn gateway_has_no_filling_modes_before_first_order() {
        let config = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let gateway = cli::build_gateway(&config);
        assert_eq!(gateway.filling_mode("EURUSD"), None);
    }
}

// ===========================================================================
// Paths
// ===========================================================================

mod paths {
    use super::*;

    #[test]
    fn relative_path_is_taken_from_config_dir() {
        let resolved = cli::resolve_path(Path::new("/etc/trader/engine.ini"), "signals.csv");
        assert_eq!(resolved, PathBuf::from("/etc/trader/signals.csv"));
    }

    #[test]
    fn absolute_path_is_kept() {
        let resolved = cli::resolve_path(Path::new("/etc/trader/engine.ini"), " /data/s.csv ");
        assert_eq!(resolved, PathBuf::from("/data/s.csv"));
    }

    #[test]
    fn bare_config_name_keeps_relative_path() {
        let resolved = cli::resolve_path(Path::new("engine.ini"), "signals.csv");
        assert_eq!(resolved, PathBuf::from("signals.csv"));
    }
}

// ===========================================================================
// Signal validation
// ===========================================================================

mod validation {
    use super::*;

    fn write_signals(dir: &Path, rows: &str) -> PathBuf {
        let path = dir.join("signals.csv");
        fs::write(&path, format!("{HEADER}{rows}")).unwrap();
        path
    }

    #[test]
    fn counts_valid_and_invalid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_signals(
            dir.path(),
            "1;3;EURUSD;15.03;20.04;1,5;Percentage;1;Long;Seasonal;10:00;18:00\n\
             2;4;GBPUSD;3rd;8th;150;Points;0.5;Short;Short-term;;\n\
             3;13;EURUSD;PMH;5;20;Points;1;Long;Breakout;;\n\
             4;3;EURUSD;PML;5;20;Points;1;Sideways;Breakout;;\n",
        );
        let summary = cli::validate_signals(&CsvSignalAdapter::new(&path)).unwrap();
        assert_eq!(summary.valid, 2);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors.iter().all(TraderError::is_row_rejection));
        assert!(summary.duplicates.is_empty());
    }

    #[test]
    fn reports_duplicate_magic_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_signals(
            dir.path(),
            "5;3;EURUSD;PMH;5;20;Points;1;Long;Breakout;;\n\
             5;4;EURUSD;PMH;5;20;Points;1;Long;Breakout;;\n\
             5;5;EURUSD;PMH;5;20;Points;1;Long;Breakout;;\n",
        );
        let summary = cli::validate_signals(&CsvSignalAdapter::new(&path)).unwrap();
        assert_eq!(summary.valid, 3);
        assert_eq!(summary.duplicates, vec![5]);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let source = CsvSignalAdapter::new("/nonexistent/signals.csv");
        assert!(matches!(
            cli::validate_signals(&source),
            Err(TraderError::Source { .. })
        ));
    }
}

// ===========================================================================
// Subcommands
// ===========================================================================

mod commands {
    use super::*;

    #[test]
    fn validate_exits_zero_for_clean_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.csv");
        fs::write(
            &path,
            format!("{HEADER}1;3;EURUSD;15.03;20.04;1;Percentage;1;Long;Seasonal;10:00;18:00\n"),
        )
        .unwrap();

        let args = ["signal-trader", "validate", "--signals", path.to_str().unwrap()];
        let code = cli::run(Cli::try_parse_from(args).unwrap());
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn validate_exits_with_validation_code_for_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals.csv");
        fs::write(
            &path,
            format!("{HEADER}x;3;EURUSD;15.03;20.04;1;Percentage;1;Long;Seasonal;10:00;18:00\n"),
        )
        .unwrap();

        let args = ["signal-trader", "validate", "--signals", path.to_str().unwrap()];
        let code = cli::run(Cli::try_parse_from(args).unwrap());
        assert!(same_code(code, ExitCode::from(3)));
    }

    #[test]
    fn run_with_missing_config_exits_with_config_code() {
        let args = ["signal-trader", "run", "--config", "/nonexistent/engine.ini"];
        let code = cli::run(Cli::try_parse_from(args).unwrap());
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn run_with_invalid_broker_kind_exits_with_config_code() {
        let ini = write_temp_ini(&VALID_INI.replace("kind = paper", "kind = live"));
        let args = [
            "signal-trader",
            "run",
            "--config",
            ini.path().to_str().unwrap(),
            "--max-ticks",
            "1",
        ];
        let code = cli::run(Cli::try_parse_from(args).unwrap());
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn run_single_tick_on_paper_broker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("signals.csv"),
            format!("{HEADER}1;3;EURUSD;15.03;20.04;1;Percentage;1;Long;Seasonal;10:00;18:00\n"),
        )
        .unwrap();
        let config = dir.path().join("engine.ini");
        fs::write(&config, VALID_INI).unwrap();

        let args = [
            "signal-trader",
            "run",
            "--config",
            config.to_str().unwrap(),
            "--max-ticks",
            "1",
        ];
        let code = cli::run(Cli::try_parse_from(args).unwrap());
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["signal-trader", "backtest"]).is_err());
    }
}
