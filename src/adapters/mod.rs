//! Concrete adapter implementations for ports.

pub mod csv_signal_adapter;
pub mod file_config_adapter;
pub mod paper_broker;
