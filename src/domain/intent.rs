//! Order intents produced by signal evaluation.
//!
//! An intent is consumed exactly once by the order gateway and never stored.

use crate::domain::signal::Direction;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenIntent {
    pub symbol: String,
    pub direction: Direction,
    pub price: f64,
    pub stoploss_price: f64,
    pub volume: f64,
    pub magic: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseIntent {
    pub symbol: String,
    pub ticket: u64,
    pub magic: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Open(OpenIntent),
    Close(CloseIntent),
}

impl Intent {
    pub fn magic(&self) -> i64 {
        match self {
            Intent::Open(o) => o.magic,
            Intent::Close(c) => c.magic,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Intent::Open(o) => &o.symbol,
            Intent::Close(c) => &c.symbol,
        }
    }
}
