//! Polling loop: one tick reconciles the catalog, evaluates every signal and
//! dispatches the resulting intents.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::domain::catalog::{ReconcileReport, SignalCatalog};
use crate::domain::error::TraderError;
use crate::domain::gateway::{Execution, OrderGateway};
use crate::domain::intent::Intent;
use crate::domain::signal_row::SignalRow;
use crate::ports::broker_port::{BrokerPort, BrokerSession};
use crate::ports::signal_source_port::SignalSourcePort;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Ticks running longer than this are logged at warn level.
    pub tick_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval: Duration::from_secs(5),
            tick_budget: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    /// `None` when the signal source could not be read this tick.
    pub reconcile: Option<ReconcileReport>,
    /// `(magic, ticket)` of positions opened this tick.
    pub opened: Vec<(i64, u64)>,
    /// `(magic, ticket)` of positions closed this tick.
    pub closed: Vec<(i64, u64)>,
    /// Signals whose evaluation or dispatch failed.
    pub failed: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ErrorKey {
    Source,
    SourceRow(usize),
    Signal(i64),
    Tick,
}

/// Remembers the last error per key so repeats are not logged again.
#[derive(Debug, Default)]
struct ErrorLog {
    last: HashMap<ErrorKey, String>,
}

impl ErrorLog {
    /// `true` when `err` differs from the last error recorded under `key`.
    fn record(&mut self, key: ErrorKey, err: &TraderError) -> bool {
        let text = err.to_string();
        if self.last.get(&key) == Some(&text) {
            return false;
        }
        self.last.insert(key, text);
        true
    }

    fn clear(&mut self, key: &ErrorKey) {
        self.last.remove(key);
    }

    fn signal(&mut self, magic: i64, err: &TraderError) {
        if self.record(ErrorKey::Signal(magic), err) {
            tracing::warn!(magic, error = %err, "signal error");
        }
    }
}

pub struct Scheduler {
    source: Box<dyn SignalSourcePort>,
    broker: Box<dyn BrokerPort>,
    catalog: SignalCatalog,
    gateway: OrderGateway,
    config: SchedulerConfig,
    errors: ErrorLog,
}

impl Scheduler {
    pub fn new(
        source: Box<dyn SignalSourcePort>,
        broker: Box<dyn BrokerPort>,
        catalog: SignalCatalog,
        gateway: OrderGateway,
        config: SchedulerConfig,
    ) -> Self {
        Scheduler {
            source,
            broker,
            catalog,
            gateway,
            config,
            errors: ErrorLog::default(),
        }
    }

    pub fn catalog(&self) -> &SignalCatalog {
        &self.catalog
    }

    /// Rows from the source, or `None` when the source is unreadable. Bad
    /// rows are logged and dropped.
    fn load_rows(&mut self) -> Option<Vec<SignalRow>> {
        let loaded = match self.source.load_rows() {
            Ok(loaded) => loaded,
            Err(err) => {
                if self.errors.record(ErrorKey::Source, &err) {
                    tracing::error!(error = %err, "signal source unreadable, keeping current signals");
                }
                return None;
            }
        };
        self.errors.clear(&ErrorKey::Source);

        let mut rows = Vec::with_capacity(loaded.len());
        for (index, row) in loaded.into_iter().enumerate() {
            match row {
                Ok(row) => {
                    self.errors.clear(&ErrorKey::SourceRow(index));
                    rows.push(row);
                }
                Err(err) => {
                    if self.errors.record(ErrorKey::SourceRow(index), &err) {
                        tracing::warn!(row = index + 1, error = %err, "unreadable signal row");
                    }
                }
            }
        }
        Some(rows)
    }

    /// Run one cycle at `now`.
    ///
    /// A connection error aborts the tick and is returned. Before dispatch
    /// the catalog is left exactly as it was; once orders go out, positions
    /// already opened or closed stay recorded. Any other per-signal failure
    /// is logged and the tick continues with the next signal.
    pub fn tick(&mut self, now: NaiveDateTime) -> Result<TickReport, TraderError> {
        let rows = self.load_rows();
        let mut report = TickReport::default();

        let mut session = BrokerSession::open(self.broker.as_mut())?;

        // Reconcile and evaluate on a copy, committed once both succeed.
        let mut staged = self.catalog.clone();
        if let Some(rows) = rows {
            let reconciled = staged.reconcile(&rows, session.broker(), now)?;
            report.reconcile = Some(reconciled);
        }
        let evaluated = staged.evaluate_all(now, session.broker())?;
        self.catalog = staged;

        let mut intents: Vec<Intent> = Vec::new();
        for (magic, result) in evaluated {
            match result {
                Ok(Some(intent)) => intents.push(intent),
                Ok(None) => self.errors.clear(&ErrorKey::Signal(magic)),
                Err(err) => {
                    report.failed.push(magic);
                    self.errors.signal(magic, &err);
                }
            }
        }

        for intent in intents {
            let magic = intent.magic();
            let execution = match self.gateway.execute(session.broker_mut(), &intent) {
                Ok(execution) => execution,
                Err(err) if err.is_connection() => return Err(err),
                Err(err) => {
                    report.failed.push(magic);
                    self.errors.signal(magic, &err);
                    continue;
                }
            };
            let Some(signal) = self.catalog.get_mut(magic) else {
                continue;
            };
            let applied = match execution {
                Execution::Opened { ticket } => signal
                    .mark_open(ticket, now)
                    .map(|()| report.opened.push((magic, ticket))),
                Execution::Closed { ticket } => signal
                    .mark_closed()
                    .map(|()| report.closed.push((magic, ticket))),
            };
            match applied {
                Ok(()) => self.errors.clear(&ErrorKey::Signal(magic)),
                Err(err) => {
                    report.failed.push(magic);
                    self.errors.signal(magic, &err);
                }
            }
        }

        Ok(report)
    }

    /// Tick every `interval` until `max_ticks` ticks have run, or forever.
    /// Returns the number of ticks run.
    pub fn run(&mut self, max_ticks: Option<u64>) -> u64 {
        self.run_with_clock(max_ticks, || chrono::Local::now().naive_local())
    }

    pub fn run_with_clock(
        &mut self,
        max_ticks: Option<u64>,
        clock: impl Fn() -> NaiveDateTime,
    ) -> u64 {
        let interval = self.config.interval;
        let mut ticks = 0u64;
        let mut next = Instant::now();

        tracing::info!(
            interval_secs = interval.as_secs_f64(),
            max_ticks = ?max_ticks,
            "scheduler started"
        );
        while max_ticks.is_none_or(|max| ticks < max) {
            let started = Instant::now();
            match self.tick(clock()) {
                Ok(report) => {
                    self.errors.clear(&ErrorKey::Tick);
                    log_tick(&report);
                }
                Err(err) => {
                    if self.errors.record(ErrorKey::Tick, &err) {
                        tracing::error!(error = %err, "tick aborted");
                    }
                }
            }
            ticks += 1;

            let took = started.elapsed();
            if took > self.config.tick_budget {
                tracing::warn!(
                    took_ms = took.as_millis() as u64,
                    budget_ms = self.config.tick_budget.as_millis() as u64,
                    "tick exceeded its budget"
                );
            }
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            next += interval;
            let now = Instant::now();
            if interval.is_zero() {
                next = now;
                continue;
            }
            let mut skipped = 0u64;
            while next < now {
                next += interval;
                skipped += 1;
            }
            if skipped > 0 {
                tracing::warn!(skipped, "tick overran the interval, skipping missed ticks");
            }
            std::thread::sleep(next.saturating_duration_since(Instant::now()));
        }
        tracing::info!(ticks, "scheduler stopped");
        ticks
    }
}

fn log_tick(report: &TickReport) {
    let (created, rejected) = report
        .reconcile
        .as_ref()
        .map(|r| (r.created.len(), r.rejected.len()))
        .unwrap_or_default();
    if created + rejected + report.opened.len() + report.closed.len() > 0 {
        tracing::info!(
            created,
            rejected,
            opened = report.opened.len(),
            closed = report.closed.len(),
            failed = report.failed.len(),
            "tick complete"
        );
    } else {
        tracing::debug!(failed = report.failed.len(), "tick complete");
    }
}
