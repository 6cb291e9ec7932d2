//! Raw signal-source rows and their validation into [`SignalSpec`]s.

use chrono::NaiveTime;
use serde::Deserialize;

use crate::domain::breakout::ReferenceLevel;
use crate::domain::error::TraderError;
use crate::domain::seasonal::DayMonth;
use crate::domain::signal::{Direction, SignalKind, StopLoss, StopLossKind};

/// One row of the signal file, exactly as read. Every field stays a string
/// so that malformed values surface as validation errors instead of
/// deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct SignalRow {
    #[serde(rename = "Magic Number")]
    pub magic: String,
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Entry")]
    pub entry: String,
    #[serde(rename = "TP")]
    pub tp: String,
    #[serde(rename = "SL")]
    pub sl: String,
    #[serde(rename = "SL Type")]
    pub sl_type: String,
    #[serde(rename = "Risk")]
    pub risk: String,
    #[serde(rename = "Direction")]
    pub direction: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Open Time", default)]
    pub open_time: String,
    #[serde(rename = "Close Time", default)]
    pub close_time: String,
}

/// Fields shared by every signal variant.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub month: u32,
    pub symbol: String,
    pub direction: Direction,
    pub stoploss: StopLoss,
    pub risk_percent: f64,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
}

/// Variant-specific trigger parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    Seasonal {
        open_day: DayMonth,
        close_day: DayMonth,
    },
    ShortTerm {
        start_trading_day: u32,
        end_trading_day: u32,
    },
    Breakout {
        level: ReferenceLevel,
        duration_trading_days: u32,
    },
}

impl TriggerSpec {
    pub fn kind(&self) -> SignalKind {
        match self {
            TriggerSpec::Seasonal { .. } => SignalKind::Seasonal,
            TriggerSpec::ShortTerm { .. } => SignalKind::ShortTerm,
            TriggerSpec::Breakout { .. } => SignalKind::Breakout,
        }
    }
}

/// A validated row.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub magic: i64,
    pub params: SignalParams,
    pub trigger: TriggerSpec,
}

/// Parse a decimal that may use a comma as separator ("1,5" or "1.5").
pub fn parse_decimal(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an `HH:MM` time of day. Empty input means "no gate".
pub fn parse_time_of_day(value: &str) -> Result<Option<NaiveTime>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map(Some)
        .map_err(|_| format!("time {trimmed} has wrong format, it must be HH:MM"))
}

/// Leading integer of a free-text field: "3rd trading day" → 3.
pub fn leading_integer(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl SignalRow {
    pub fn kind(&self) -> SignalKind {
        SignalKind::from_type_field(&self.kind)
    }

    /// Magic number, if it parses, for error context.
    pub fn magic_number(&self) -> Option<i64> {
        self.magic.trim().parse().ok()
    }

    /// Validate every field and build the spec of the signal this row describes.
    pub fn parse(&self) -> Result<SignalSpec, TraderError> {
        let magic = self
            .magic_number()
            .ok_or_else(|| TraderError::validation(None, "Magic Number", format!("{:?} is not an integer", self.magic)))?;
        let invalid = |field: &str, reason: String| TraderError::validation(Some(magic), field, reason);

        let month: u32 = self
            .month
            .trim()
            .parse()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| invalid("Month", format!("{:?} is not a month number", self.month)))?;

        let symbol = self.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(invalid("Symbol", "empty symbol".into()));
        }

        let sl_value = parse_decimal(&self.sl)
            .filter(|v| *v >= 0.0)
            .ok_or_else(|| invalid("SL", format!("{:?} is not a non-negative number", self.sl)))?;
        let sl_kind = match self.sl_type.trim().to_ascii_lowercase().as_str() {
            "percentage" => StopLossKind::Percentage,
            "points" => StopLossKind::Points,
            _ => {
                return Err(invalid(
                    "SL Type",
                    format!("{:?} must be Percentage or Points", self.sl_type),
                ));
            }
        };

        let risk_percent = parse_decimal(&self.risk)
            .filter(|v| *v > 0.0 && *v <= 100.0)
            .ok_or_else(|| invalid("Risk", format!("{:?} is not a percentage in (0, 100]", self.risk)))?;

        let direction = match self.direction.trim().to_ascii_lowercase().as_str() {
            "long" => Direction::Long,
            "short" => Direction::Short,
            _ => {
                return Err(invalid(
                    "Direction",
                    format!("{:?} must be Long or Short", self.direction),
                ));
            }
        };

        let open_time = parse_time_of_day(&self.open_time).map_err(|e| invalid("Open Time", e))?;
        let close_time =
            parse_time_of_day(&self.close_time).map_err(|e| invalid("Close Time", e))?;

        let trigger = match self.kind() {
            SignalKind::Seasonal => {
                let open_day = DayMonth::parse(&self.entry)
                    .ok_or_else(|| invalid("Entry", format!("{:?} must be DD.MM", self.entry)))?;
                let close_day = DayMonth::parse(&self.tp)
                    .ok_or_else(|| invalid("TP", format!("{:?} must be DD.MM", self.tp)))?;
                if open_time.is_none() {
                    return Err(invalid("Open Time", "seasonal signals need an open time".into()));
                }
                if close_time.is_none() {
                    return Err(invalid("Close Time", "seasonal signals need a close time".into()));
                }
                TriggerSpec::Seasonal {
                    open_day,
                    close_day,
                }
            }
            SignalKind::ShortTerm => {
                let start_trading_day = leading_integer(&self.entry)
                    .filter(|d| *d >= 1)
                    .ok_or_else(|| invalid("Entry", format!("{:?} has no trading day number", self.entry)))?;
                let end_trading_day = leading_integer(&self.tp)
                    .filter(|d| *d >= start_trading_day)
                    .ok_or_else(|| {
                        invalid(
                            "TP",
                            format!("{:?} has no trading day number at or after {start_trading_day}", self.tp),
                        )
                    })?;
                TriggerSpec::ShortTerm {
                    start_trading_day,
                    end_trading_day,
                }
            }
            SignalKind::Breakout => {
                let level = ReferenceLevel::parse(&self.entry)
                    .ok_or_else(|| invalid("Entry", format!("{:?} must be PMH or PML", self.entry)))?;
                let duration_trading_days = leading_integer(&self.tp)
                    .filter(|d| *d >= 1)
                    .ok_or_else(|| invalid("TP", format!("{:?} has no duration in trading days", self.tp)))?;
                TriggerSpec::Breakout {
                    level,
                    duration_trading_days,
                }
            }
        };

        Ok(SignalSpec {
            magic,
            params: SignalParams {
                month,
                symbol,
                direction,
                stoploss: StopLoss {
                    value: sl_value,
                    kind: sl_kind,
                },
                risk_percent,
                open_time,
                close_time,
            },
            trigger,
        })
    }
}
