//! Core domain types and logic.

pub mod breakout;
pub mod catalog;
pub mod config_validation;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod market;
pub mod order;
pub mod retcode;
pub mod risk;
pub mod scheduler;
pub mod seasonal;
pub mod short_term;
pub mod signal;
pub mod signal_row;
