//! CLI definition and dispatch.

use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::adapters::csv_signal_adapter::CsvSignalAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::catalog::{CatalogSettings, SignalCatalog};
use crate::domain::config_validation::{validate_broker_config, validate_engine_config};
use crate::domain::error::TraderError;
use crate::domain::gateway::OrderGateway;
use crate::domain::scheduler::{Scheduler, SchedulerConfig};
use crate::domain::signal::EvalSettings;
use crate::ports::config_port::ConfigPort;
use crate::ports::signal_source_port::SignalSourcePort;

pub const LOG_FILE_NAME: &str = "signal-trader.log";

#[derive(Parser, Debug)]
#[command(name = "signal-trader", about = "Signal-driven trading automation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the signal loop against the configured broker
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Log filter used when RUST_LOG is not set
        #[arg(long, default_value = "info")]
        log_level: String,
    },
    /// Check every row of a signal file without touching a broker
    Validate {
        #[arg(short, long)]
        signals: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            max_ticks,
            log_level,
        } => run_engine(&config, max_ticks, &log_level),
        Command::Validate { signals } => run_validate(&signals),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Positive integer from `[engine]`, falling back to `default`.
fn engine_u32(config: &dyn ConfigPort, key: &str, default: u32) -> u32 {
    u32::try_from(config.get_int("engine", key, i64::from(default))).unwrap_or(default)
}

fn engine_u64(config: &dyn ConfigPort, key: &str, default: u64) -> u64 {
    let fallback = i64::try_from(default).unwrap_or(i64::MAX);
    u64::try_from(config.get_int("engine", key, fallback)).unwrap_or(default)
}

pub fn build_eval_settings(config: &dyn ConfigPort) -> EvalSettings {
    let defaults = EvalSettings::default();
    EvalSettings {
        open_grace: TimeDelta::minutes(config.get_int("engine", "open_grace_minutes", 60).max(0)),
        heartbeat: engine_u32(config, "heartbeat_evaluations", defaults.heartbeat).max(1),
        sizing_backoff: TimeDelta::seconds(
            config.get_int("engine", "sizing_backoff_seconds", 60).max(0),
        ),
    }
}

pub fn build_catalog_settings(config: &dyn ConfigPort) -> CatalogSettings {
    CatalogSettings {
        history_lookback: TimeDelta::days(
            config.get_int("engine", "history_lookback_days", 365).max(0),
        ),
        history_lookahead: TimeDelta::days(
            config.get_int("engine", "history_lookahead_days", 2).max(0),
        ),
        eval: build_eval_settings(config),
    }
}

pub fn build_scheduler_config(config: &dyn ConfigPort) -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_secs(engine_u64(config, "interval_seconds", 5).max(1)),
        tick_budget: Duration::from_secs(engine_u64(config, "tick_budget_seconds", 30).max(1)),
    }
}

pub fn build_gateway(config: &dyn ConfigPort) -> OrderGateway {
    let comment = config
        .get_string("engine", "order_comment")
        .unwrap_or_else(|| "signal-trader".to_string());
    OrderGateway::new(engine_u32(config, "deviation", 20), comment)
}

/// `value` as a path, relative paths taken from the config file's directory.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim());
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

/// Console logging plus an optional log file under `log_dir`. The returned
/// guard flushes the file writer when dropped.
pub fn init_tracing(level: &str, log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
    {
        eprintln!("warning: logging already initialised: {e}");
    }
    Ok(guard)
}

fn run_engine(config_path: &Path, max_ticks: Option<u64>, log_level: &str) -> ExitCode {
    // Stage 1: Load config
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Logging
    let log_dir = adapter
        .get_string("log", "dir")
        .filter(|s| !s.trim().is_empty())
        .map(|dir| resolve_path(config_path, &dir));
    let _guard = match init_tracing(log_level, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            let err = TraderError::Io(e);
            eprintln!("error: cannot open log directory: {err}");
            return (&err).into();
        }
    };
    tracing::info!(config = %config_path.display(), "configuration loaded");

    // Stage 3: Validate
    if let Err(e) = validate_engine_config(&adapter).and_then(|()| validate_broker_config(&adapter)) {
        tracing::error!(error = %e, "invalid configuration");
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 4: Wire ports
    let broker = match PaperBroker::from_config(&adapter) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let signals_file = adapter
        .get_string("engine", "signals_file")
        .unwrap_or_default();
    let source = CsvSignalAdapter::new(resolve_path(config_path, &signals_file));
    tracing::info!(signals = %source.path().display(), broker = "paper", "starting engine");

    let mut scheduler = Scheduler::new(
        Box::new(source),
        Box::new(broker),
        SignalCatalog::new(build_catalog_settings(&adapter)),
        build_gateway(&adapter),
        build_scheduler_config(&adapter),
    );

    // Stage 5: Loop
    let ticks = scheduler.run(max_ticks);
    eprintln!(
        "Stopped after {ticks} tick(s), {} signal(s) tracked",
        scheduler.catalog().len()
    );
    ExitCode::SUCCESS
}

/// Outcome of checking a signal file.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub valid: usize,
    pub errors: Vec<TraderError>,
    /// Magic numbers defined by more than one valid row.
    pub duplicates: Vec<i64>,
}

pub fn validate_signals(source: &dyn SignalSourcePort) -> Result<ValidationSummary, TraderError> {
    let mut summary = ValidationSummary::default();
    let mut seen = HashSet::new();
    for row in source.load_rows()? {
        match row.and_then(|row| row.parse()) {
            Ok(spec) => {
                summary.valid += 1;
                if !seen.insert(spec.magic) && !summary.duplicates.contains(&spec.magic) {
                    summary.duplicates.push(spec.magic);
                }
                println!(
                    "  {:>10}  {:<10}  {:<10}  month {:>2}",
                    spec.magic,
                    spec.trigger.kind().to_string(),
                    spec.params.symbol,
                    spec.params.month
                );
            }
            Err(e) => summary.errors.push(e),
        }
    }
    Ok(summary)
}

fn run_validate(signals_path: &Path) -> ExitCode {
    eprintln!("Validating signals: {}", signals_path.display());
    let source = CsvSignalAdapter::new(signals_path);
    let summary = match validate_signals(&source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for e in &summary.errors {
        eprintln!("  error: {e}");
    }
    for magic in &summary.duplicates {
        eprintln!("  warning: magic {magic} is defined more than once, the last row wins");
    }
    eprintln!(
        "\n{} valid row(s), {} invalid row(s)",
        summary.valid,
        summary.errors.len()
    );

    match summary.errors.first() {
        Some(e) => e.into(),
        None => ExitCode::SUCCESS,
    }
}
