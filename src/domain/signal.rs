//! Signal entity and its lifecycle.
//!
//! A signal is one row of the signal file brought to life: it carries the
//! common order parameters, a variant-specific trigger state machine and the
//! lifecycle status. Status only moves forward (init → open → close); the
//! magic number and the variant are fixed at creation.

use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;

use crate::domain::breakout::BreakoutTrigger;
use crate::domain::error::TraderError;
use crate::domain::intent::{CloseIntent, Intent, OpenIntent};
use crate::domain::risk;
use crate::domain::seasonal::SeasonalTrigger;
use crate::domain::short_term::ShortTermTrigger;
use crate::domain::signal_row::{SignalParams, SignalSpec, TriggerSpec};
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Init,
    Open,
    Close,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Init => write!(f, "init"),
            Status::Open => write!(f, "open"),
            Status::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopLossKind {
    Percentage,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLoss {
    pub value: f64,
    pub kind: StopLossKind,
}

/// Variant discriminator taken from the `Type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Seasonal,
    ShortTerm,
    Breakout,
}

impl SignalKind {
    /// `Seasonal` and `Short-term` are matched exactly; everything else is a
    /// breakout signal.
    pub fn from_type_field(value: &str) -> Self {
        match value.trim() {
            "Seasonal" => SignalKind::Seasonal,
            "Short-term" => SignalKind::ShortTerm,
            _ => SignalKind::Breakout,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Seasonal => write!(f, "Seasonal"),
            SignalKind::ShortTerm => write!(f, "Short-term"),
            SignalKind::Breakout => write!(f, "Breakout"),
        }
    }
}

/// Tuning shared by every evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSettings {
    /// How late a seasonal open may still fire before it rolls to next year.
    pub open_grace: TimeDelta,
    /// Breakout progress is recomputed every `heartbeat` evaluations.
    pub heartbeat: u32,
    /// Pause applied to a signal whose entry could not be sized.
    pub sizing_backoff: TimeDelta,
}

impl Default for EvalSettings {
    fn default() -> Self {
        EvalSettings {
            open_grace: TimeDelta::minutes(60),
            heartbeat: 12,
            sizing_backoff: TimeDelta::seconds(60),
        }
    }
}

/// What a trigger decided for the current evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
}

/// Read-only view of a signal handed to its trigger state machine.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    pub now: NaiveDateTime,
    pub magic: i64,
    pub status: Status,
    pub params: &'a SignalParams,
    pub opened_at: Option<NaiveDateTime>,
    pub settings: &'a EvalSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Seasonal(SeasonalTrigger),
    ShortTerm(ShortTermTrigger),
    Breakout(BreakoutTrigger),
}

impl Trigger {
    fn from_spec(spec: TriggerSpec) -> Self {
        match spec {
            TriggerSpec::Seasonal {
                open_day,
                close_day,
            } => Trigger::Seasonal(SeasonalTrigger::new(open_day, close_day)),
            TriggerSpec::ShortTerm {
                start_trading_day,
                end_trading_day,
            } => Trigger::ShortTerm(ShortTermTrigger::new(start_trading_day, end_trading_day)),
            TriggerSpec::Breakout {
                level,
                duration_trading_days,
            } => Trigger::Breakout(BreakoutTrigger::new(level, duration_trading_days)),
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            Trigger::Seasonal(_) => SignalKind::Seasonal,
            Trigger::ShortTerm(_) => SignalKind::ShortTerm,
            Trigger::Breakout(_) => SignalKind::Breakout,
        }
    }

    /// Replace the configured parameters, keeping runtime state.
    fn apply(&mut self, spec: TriggerSpec) {
        match (self, spec) {
            (
                Trigger::Seasonal(t),
                TriggerSpec::Seasonal {
                    open_day,
                    close_day,
                },
            ) => {
                t.open_day = open_day;
                t.close_day = close_day;
            }
            (
                Trigger::ShortTerm(t),
                TriggerSpec::ShortTerm {
                    start_trading_day,
                    end_trading_day,
                },
            ) => {
                t.start_trading_day = start_trading_day;
                t.end_trading_day = end_trading_day;
            }
            (
                Trigger::Breakout(t),
                TriggerSpec::Breakout {
                    level,
                    duration_trading_days,
                },
            ) => {
                t.level = level;
                t.duration_trading_days = duration_trading_days;
            }
            // Variant changes are rejected before reaching here.
            _ => {}
        }
    }
}

/// Initial lifecycle state recovered from the broker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resume {
    Init,
    Open {
        ticket: u64,
        opened_at: Option<NaiveDateTime>,
    },
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    magic: i64,
    params: SignalParams,
    trigger: Trigger,
    status: Status,
    ticket: Option<u64>,
    opened_at: Option<NaiveDateTime>,
    paused_until: Option<NaiveDateTime>,
}

impl Signal {
    pub fn new(spec: SignalSpec) -> Self {
        Signal::restore(spec, Resume::Init)
    }

    /// Build a signal whose status was recovered from broker state.
    pub fn restore(spec: SignalSpec, resume: Resume) -> Self {
        let (status, ticket, opened_at) = match resume {
            Resume::Init => (Status::Init, None, None),
            Resume::Open { ticket, opened_at } => (Status::Open, Some(ticket), opened_at),
            Resume::Closed => (Status::Close, None, None),
        };
        Signal {
            magic: spec.magic,
            params: spec.params,
            trigger: Trigger::from_spec(spec.trigger),
            status,
            ticket,
            opened_at,
            paused_until: None,
        }
    }

    pub fn magic(&self) -> i64 {
        self.magic
    }

    pub fn symbol(&self) -> &str {
        &self.params.symbol
    }

    pub fn params(&self) -> &SignalParams {
        &self.params
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn kind(&self) -> SignalKind {
        self.trigger.kind()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn ticket(&self) -> Option<u64> {
        self.ticket
    }

    pub fn opened_at(&self) -> Option<NaiveDateTime> {
        self.opened_at
    }

    pub fn paused_until(&self) -> Option<NaiveDateTime> {
        self.paused_until
    }

    /// Refresh the mutable fields from a newer row of the same magic and
    /// recompute derived values. Status and ticket are left untouched.
    pub fn refresh(
        &mut self,
        spec: SignalSpec,
        now: NaiveDateTime,
        settings: &EvalSettings,
    ) -> Result<(), TraderError> {
        if spec.magic != self.magic {
            return Err(TraderError::validation(
                Some(spec.magic),
                "Magic Number",
                format!("cannot refresh signal {} from this row", self.magic),
            ));
        }
        if spec.trigger.kind() != self.kind() {
            return Err(TraderError::validation(
                Some(self.magic),
                "Type",
                format!(
                    "signal was created as {}, row now says {}",
                    self.kind(),
                    spec.trigger.kind()
                ),
            ));
        }
        if spec.params.symbol != self.params.symbol && self.status != Status::Init {
            return Err(TraderError::validation(
                Some(self.magic),
                "Symbol",
                format!(
                    "cannot move a {} signal from {} to {}",
                    self.status, self.params.symbol, spec.params.symbol
                ),
            ));
        }

        self.params = spec.params;
        self.trigger.apply(spec.trigger);
        self.recompute(now, settings);
        Ok(())
    }

    /// Recompute derived timestamps for `now`.
    pub fn recompute(&mut self, now: NaiveDateTime, settings: &EvalSettings) {
        if let Trigger::Seasonal(t) = &mut self.trigger {
            t.recompute(
                now,
                self.status,
                self.opened_at,
                &self.params,
                settings.open_grace,
            );
        }
    }

    /// Decide whether this signal wants to open or close a position now.
    ///
    /// Closed and paused signals never produce an intent. A sizing failure
    /// pauses the signal for `settings.sizing_backoff` and is reported.
    pub fn evaluate(
        &mut self,
        now: NaiveDateTime,
        broker: &dyn BrokerPort,
        settings: &EvalSettings,
    ) -> Result<Option<Intent>, TraderError> {
        if self.status == Status::Close {
            return Ok(None);
        }
        if self.paused_until.is_some_and(|until| now < until) {
            return Ok(None);
        }
        self.paused_until = None;

        let ctx = TriggerContext {
            now,
            magic: self.magic,
            status: self.status,
            params: &self.params,
            opened_at: self.opened_at,
            settings,
        };
        let action = match &mut self.trigger {
            Trigger::Seasonal(t) => t.decide(&ctx),
            Trigger::ShortTerm(t) => t.decide(&ctx, broker)?,
            Trigger::Breakout(t) => t.decide(&ctx, broker)?,
        };

        match (action, self.status) {
            (Some(Action::Open), Status::Init) => match self.open_intent(broker) {
                Ok(intent) => Ok(Some(intent)),
                Err(err @ TraderError::Sizing(_)) => {
                    self.paused_until = Some(now + settings.sizing_backoff);
                    Err(err)
                }
                Err(err) => Err(err),
            },
            (Some(Action::Close), Status::Open) => {
                let ticket = self.ticket.ok_or(TraderError::InvalidTransition {
                    magic: self.magic,
                    from: self.status,
                    to: Status::Close,
                })?;
                Ok(Some(Intent::Close(CloseIntent {
                    symbol: self.params.symbol.clone(),
                    ticket,
                    magic: self.magic,
                })))
            }
            _ => Ok(None),
        }
    }

    fn open_intent(&self, broker: &dyn BrokerPort) -> Result<Intent, TraderError> {
        let account = broker.account_snapshot()?;
        let info = broker
            .symbol_info(&self.params.symbol)?
            .ok_or_else(|| TraderError::UnknownSymbol {
                symbol: self.params.symbol.clone(),
            })?;
        let plan = risk::plan_entry(
            &account,
            &info,
            self.params.direction,
            &self.params.stoploss,
            self.params.risk_percent,
        )?;
        Ok(Intent::Open(OpenIntent {
            symbol: self.params.symbol.clone(),
            direction: self.params.direction,
            price: plan.price,
            stoploss_price: plan.stoploss_price,
            volume: plan.volume,
            magic: self.magic,
        }))
    }

    /// init → open, recording the position ticket.
    pub fn mark_open(&mut self, ticket: u64, at: NaiveDateTime) -> Result<(), TraderError> {
        if self.status != Status::Init {
            return Err(TraderError::InvalidTransition {
                magic: self.magic,
                from: self.status,
                to: Status::Open,
            });
        }
        self.status = Status::Open;
        self.ticket = Some(ticket);
        self.opened_at = Some(at);
        if let Trigger::Breakout(t) = &mut self.trigger {
            t.confirm_open(at);
        }
        Ok(())
    }

    /// open → close. The ticket is kept for audit.
    pub fn mark_closed(&mut self) -> Result<(), TraderError> {
        if self.status != Status::Open {
            return Err(TraderError::InvalidTransition {
                magic: self.magic,
                from: self.status,
                to: Status::Close,
            });
        }
        self.status = Status::Close;
        Ok(())
    }
}
