//! Event Hub Sync - the keeper
//!
//! - [`keeper`] - the control loop and its handle
//! - [`schedule`] - per-source next-run and in-progress state
//! - [`saver`] - stores imported batches into a repository
//!
//! # Overview
//!
//! [`SourceKeeper::start`] spawns a loop that imports every registered source
//! on a fixed interval and replays recorded scans back to their source until
//! they are accepted. Callers talk to it through a [`KeeperHandle`].

pub mod keeper;
pub mod saver;
pub mod schedule;

pub use keeper::{KeeperHandle, ReplayEvent, SourceKeeper};
pub use saver::ItemSaver;
pub use schedule::{Schedule, SourceSchedule};
