pub mod broker_port;
pub mod config_port;
pub mod signal_source_port;

#[cfg(test)]
pub(crate) mod fake_broker;
