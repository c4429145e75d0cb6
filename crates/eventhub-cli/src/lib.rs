//! Event Hub CLI - Command-line interface for the Event Hub source keeper
//!
//! This crate provides the CLI application that ties together all Event Hub components.

pub mod config;
pub mod context;

pub use config::{properties_map, Command, Config, ExportFormat};
pub use context::AppContext;
