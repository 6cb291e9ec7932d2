//! Broker order requests and their results.

use crate::domain::retcode;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl From<Direction> for OrderSide {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }
}

/// Order-filling policy. The numeric values are the terminal's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillingMode {
    FillOrKill = 0,
    ImmediateOrCancel = 1,
    Return = 2,
}

impl FillingMode {
    /// Order in which modes are tried when resolving the one a broker accepts.
    pub const ALL: [FillingMode; 3] = [
        FillingMode::FillOrKill,
        FillingMode::ImmediateOrCancel,
        FillingMode::Return,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }
}

/// A market deal request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub price: f64,
    /// Stop-loss price, `None` for trial requests.
    pub stoploss: Option<f64>,
    pub deviation: u32,
    pub magic: i64,
    pub comment: String,
    pub filling: FillingMode,
}

/// Result of a dry-run validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCheck {
    pub retcode: u32,
    pub comment: String,
}

impl OrderCheck {
    /// Validation passes with retcode 0, reported as "Done".
    pub fn accepted(&self) -> bool {
        self.retcode == 0 || self.comment == "Done"
    }
}

/// Result of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub retcode: u32,
    /// Position ticket on success, 0 otherwise.
    pub ticket: u64,
    pub comment: String,
}

impl OrderResult {
    pub fn is_done(&self) -> bool {
        self.retcode == retcode::DONE
    }
}
