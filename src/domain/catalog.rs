//! The set of live signals, reconciled against the signal rows on every tick.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDateTime, TimeDelta};

use crate::domain::error::TraderError;
use crate::domain::intent::Intent;
use crate::domain::market::DealInfo;
use crate::domain::signal::{EvalSettings, Resume, Signal, Status};
use crate::domain::signal_row::{SignalRow, SignalSpec};
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    /// Deals this far before now count as evidence of a closed signal.
    pub history_lookback: TimeDelta,
    /// Deals up to this far after now are included (broker clock skew).
    pub history_lookahead: TimeDelta,
    pub eval: EvalSettings,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            history_lookback: TimeDelta::days(365),
            history_lookahead: TimeDelta::days(2),
            eval: EvalSettings::default(),
        }
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: Vec<i64>,
    pub updated: usize,
    /// Rows rejected for the first time in this pass.
    pub rejected: Vec<TraderError>,
    /// Rows skipped because the same content was rejected before.
    pub skipped: usize,
}

enum Plan {
    Create(SignalSpec, Resume),
    Update(SignalSpec, SignalRow),
    Reject(SignalRow, TraderError),
}

#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    signals: BTreeMap<i64, Signal>,
    rejected: HashSet<SignalRow>,
    settings: CatalogSettings,
}

impl SignalCatalog {
    pub fn new(settings: CatalogSettings) -> Self {
        SignalCatalog {
            signals: BTreeMap::new(),
            rejected: HashSet::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn get(&self, magic: i64) -> Option<&Signal> {
        self.signals.get(&magic)
    }

    pub fn get_mut(&mut self, magic: i64) -> Option<&mut Signal> {
        self.signals.get_mut(&magic)
    }

    /// Signals in ascending magic order.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Bring the catalog in line with `rows`.
    ///
    /// Every broker query happens before the catalog is touched, so a
    /// connection failure returns an error and leaves the catalog as it was.
    /// Invalid rows are logged, remembered and skipped until their content
    /// changes.
    pub fn reconcile(
        &mut self,
        rows: &[SignalRow],
        broker: &dyn BrokerPort,
        now: NaiveDateTime,
    ) -> Result<ReconcileReport, TraderError> {
        let mut report = ReconcileReport::default();
        let mut plans = Vec::with_capacity(rows.len());
        let mut planned_new: HashSet<i64> = HashSet::new();
        let mut deals: Option<Vec<DealInfo>> = None;
        let mut still_rejected = HashSet::new();

        for row in rows {
            if self.rejected.contains(row) {
                still_rejected.insert(row.clone());
                report.skipped += 1;
                continue;
            }
            let spec = match row.parse() {
                Ok(spec) => spec,
                Err(err) => {
                    plans.push(Plan::Reject(row.clone(), err));
                    continue;
                }
            };
            if planned_new.contains(&spec.magic) {
                plans.push(Plan::Update(spec, row.clone()));
                continue;
            }
            // An init signal moved to another symbol is checked and resumed
            // like a new one.
            if let Some(existing) = self.signals.get(&spec.magic) {
                let moved = existing.status() == Status::Init
                    && existing.kind() == spec.trigger.kind()
                    && existing.symbol() != spec.params.symbol;
                if !moved {
                    plans.push(Plan::Update(spec, row.clone()));
                    continue;
                }
            }
            if broker.symbol_info(&spec.params.symbol)?.is_none() {
                let err = TraderError::UnknownSymbol {
                    symbol: spec.params.symbol.clone(),
                };
                plans.push(Plan::Reject(row.clone(), err));
                continue;
            }
            let resume = self.resume(&spec, broker, now, &mut deals)?;
            planned_new.insert(spec.magic);
            plans.push(Plan::Create(spec, resume));
        }

        // Nothing below talks to the broker.
        self.rejected = still_rejected;
        for plan in plans {
            match plan {
                Plan::Create(spec, resume) => {
                    let magic = spec.magic;
                    let mut signal = Signal::restore(spec, resume);
                    signal.recompute(now, &self.settings.eval);
                    let (symbol, kind, status, ticket) =
                        (signal.symbol().to_string(), signal.kind(), signal.status(), signal.ticket());
                    match self.signals.insert(magic, signal) {
                        Some(previous) => {
                            tracing::info!(
                                magic,
                                from = %previous.symbol(),
                                to = %symbol,
                                status = %status,
                                ticket = ?ticket,
                                "signal moved to another symbol"
                            );
                            report.updated += 1;
                        }
                        None => {
                            tracing::info!(
                                magic,
                                symbol = %symbol,
                                kind = %kind,
                                status = %status,
                                ticket = ?ticket,
                                "signal created"
                            );
                            report.created.push(magic);
                        }
                    }
                }
                Plan::Update(spec, row) => {
                    let magic = spec.magic;
                    let Some(signal) = self.signals.get_mut(&magic) else {
                        continue;
                    };
                    match signal.refresh(spec, now, &self.settings.eval) {
                        Ok(()) => report.updated += 1,
                        Err(err) => self.reject(row, err, &mut report),
                    }
                }
                Plan::Reject(row, err) => self.reject(row, err, &mut report),
            }
        }
        Ok(report)
    }

    fn reject(&mut self, row: SignalRow, err: TraderError, report: &mut ReconcileReport) {
        tracing::warn!(magic = ?row.magic_number(), error = %err, "signal row rejected");
        self.rejected.insert(row);
        report.rejected.push(err);
    }

    /// Initial status of a new signal: an open position wins over a past deal.
    fn resume(
        &self,
        spec: &SignalSpec,
        broker: &dyn BrokerPort,
        now: NaiveDateTime,
        deals: &mut Option<Vec<DealInfo>>,
    ) -> Result<Resume, TraderError> {
        let symbol = &spec.params.symbol;
        let positions = broker.open_positions(symbol)?;
        if let Some(p) = positions.iter().find(|p| p.magic == spec.magic) {
            return Ok(Resume::Open {
                ticket: p.ticket,
                opened_at: p.opened_at,
            });
        }

        if deals.is_none() {
            *deals = Some(broker.history_deals(
                now - self.settings.history_lookback,
                now + self.settings.history_lookahead,
            )?);
        }
        let closed = deals
            .iter()
            .flatten()
            .any(|d| d.magic == spec.magic && d.symbol == *symbol);
        if closed {
            return Ok(Resume::Closed);
        }
        Ok(Resume::Init)
    }

    /// Evaluate every signal once. Results are keyed by magic.
    ///
    /// Signals are evaluated on copies and written back only when the whole
    /// pass completes. The first connection error stops the pass and is
    /// returned with every signal left as it was.
    pub fn evaluate_all(
        &mut self,
        now: NaiveDateTime,
        broker: &dyn BrokerPort,
    ) -> Result<Vec<(i64, Result<Option<Intent>, TraderError>)>, TraderError> {
        let settings = &self.settings.eval;
        let mut staged = Vec::with_capacity(self.signals.len());
        let mut results = Vec::with_capacity(self.signals.len());
        for (magic, signal) in &self.signals {
            let mut next = signal.clone();
            match next.evaluate(now, broker, settings) {
                Err(err) if err.is_connection() => return Err(err),
                result => results.push((*magic, result)),
            }
            staged.push((*magic, next));
        }
        self.signals.extend(staged);
        Ok(results)
    }
}
