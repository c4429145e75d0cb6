//! Event Hub DB - item store backends
//!
//! This crate implements the `ItemRepository` contract from `eventhub-core`:
//!
//! - [`memory`] - in-memory repositories with optional JSON snapshots
//! - [`postgres`] - PostgreSQL repositories sharing one `sqlx` pool
//! - [`registry`] - one open repository per configured source

pub mod memory;
pub mod postgres;
pub mod registry;

pub use memory::{MemoryConnection, MemoryRepository};
pub use postgres::{PgConnection, PgRepository};
pub use registry::RepositoryRegistry;
