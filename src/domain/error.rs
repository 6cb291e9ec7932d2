//! Domain error types.

use crate::domain::signal::Status;

/// Why a position volume could not be computed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SizingError {
    #[error("entry price equals stop price, stop distance is zero")]
    ZeroDistance,

    #[error("lot step {min_lot} needs more than 3 decimals or is not positive")]
    LotPrecision { min_lot: f64 },

    #[error("volume {volume} is below the minimum lot {min_lot}")]
    BelowMinLot { volume: f64, min_lot: f64 },

    #[error("invalid sizing input {field}: {value}")]
    InvalidInput { field: &'static str, value: f64 },
}

/// Top-level error type for signal-trader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("invalid row{}: {field}: {reason}", .magic.map(|m| format!(" (magic {m})")).unwrap_or_default())]
    Validation {
        magic: Option<i64>,
        field: String,
        reason: String,
    },

    #[error("symbol {symbol} not found in broker symbols, check the symbol field of the signal file")]
    UnknownSymbol { symbol: String },

    #[error("order rejected by server, retcode {code}: {description}")]
    ServerStatus { code: u32, description: String },

    #[error("broker connection error: {reason}")]
    Connection { reason: String },

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error("no supported filling mode for {symbol}")]
    UnsupportedFilling { symbol: String },

    #[error("close of ticket {ticket} on {symbol} was rejected")]
    CloseRejected { symbol: String, ticket: u64 },

    #[error("signal {magic} cannot move from {from} to {to}")]
    InvalidTransition { magic: i64, from: Status, to: Status },

    #[error("signal source error: {reason}")]
    Source { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn validation(magic: Option<i64>, field: &str, reason: impl Into<String>) -> Self {
        TraderError::Validation {
            magic,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        TraderError::Connection {
            reason: reason.into(),
        }
    }

    /// Errors that abort the whole cycle rather than a single signal.
    pub fn is_connection(&self) -> bool {
        matches!(self, TraderError::Connection { .. })
    }

    /// Row-level errors that exclude the row until its content changes.
    pub fn is_row_rejection(&self) -> bool {
        matches!(
            self,
            TraderError::Validation { .. } | TraderError::UnknownSymbol { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::Sizing(SizingError::LotPrecision { .. }) => 2,
            TraderError::Source { .. }
            | TraderError::Validation { .. }
            | TraderError::UnknownSymbol { .. } => 3,
            TraderError::Connection { .. } => 4,
            TraderError::ServerStatus { .. }
            | TraderError::Sizing(_)
            | TraderError::UnsupportedFilling { .. }
            | TraderError::CloseRejected { .. }
            | TraderError::InvalidTransition { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_includes_magic() {
        let err = TraderError::validation(Some(42), "SL", "not a number");
        assert_eq!(err.to_string(), "invalid row (magic 42): SL: not a number");
    }

    #[test]
    fn validation_message_without_magic() {
        let err = TraderError::validation(None, "Magic Number", "empty");
        assert_eq!(err.to_string(), "invalid row: Magic Number: empty");
    }

    #[test]
    fn classification_helpers() {
        assert!(TraderError::connection("down").is_connection());
        assert!(
            TraderError::UnknownSymbol {
                symbol: "XYZ".into()
            }
            .is_row_rejection()
        );
        assert!(
            !TraderError::ServerStatus {
                code: 10006,
                description: "Request rejected".into()
            }
            .is_row_rejection()
        );
    }

    #[test]
    fn sizing_errors_convert() {
        let err: TraderError = SizingError::ZeroDistance.into();
        assert!(matches!(err, TraderError::Sizing(SizingError::ZeroDistance)));
    }
}
