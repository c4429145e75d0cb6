//! Event Hub Core - Domain types, repository contract, error handling, and configuration.

pub mod config;
pub mod error;
pub mod models;
pub mod source;
pub mod store;
pub mod sync;

pub use config::{
    default_config_path, load_config, AppConfig, DbConfig, HttpConfig, KeeperConfig,
    StorageAdapter,
};
pub use error::AppError;
pub use models::{Activity, Fields, Item, ItemActivities, ItemDetail};
pub use source::{SourceDescriptor, UpdateMethod, BATCH_SIZE};
pub use store::{DbConnection, ItemRepository};
pub use sync::{BatchStats, ImportResult, ImportSummary, SaveOutcome};
