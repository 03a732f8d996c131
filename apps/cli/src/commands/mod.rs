//! Subcommands

pub mod config;
pub mod monitor;
pub mod ports;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
