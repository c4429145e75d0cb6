//! Wiring shared by every command.
//!
//! The context is built once in `main` and passed down explicitly.

use std::sync::Arc;

use eventhub_client::{HttpTransport, Transport};
use eventhub_core::config::{AppConfig, HttpConfig, StorageAdapter, StorageSection};
use eventhub_core::error::AppError;
use eventhub_core::source::SourceDescriptor;
use eventhub_core::store::{DbConnection, ItemRepository};
use eventhub_db::{MemoryConnection, PgConnection, RepositoryRegistry};
use eventhub_sync::SourceKeeper;
use tracing::info;

pub struct AppContext {
    pub config: AppConfig,
    pub registry: Arc<RepositoryRegistry>,
    pub transport: Arc<dyn Transport>,
}

impl AppContext {
    /// Opens the configured store and one repository per source.
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&HttpConfig::default())?);
        Self::with_transport(config, transport).await
    }

    pub async fn with_transport(
        config: AppConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, AppError> {
        let connection = open_connection(&config.storage).await?;
        let names: Vec<String> = config.sources.iter().map(|s| s.name.clone()).collect();
        let registry = RepositoryRegistry::open(connection, names).await?;

        Ok(Self {
            config,
            registry: Arc::new(registry),
            transport,
        })
    }

    pub fn source(&self, name: &str) -> Result<&SourceDescriptor, AppError> {
        self.config
            .source(name)
            .ok_or_else(|| AppError::SourceNotFound(name.to_string()))
    }

    pub fn repository(&self, name: &str) -> Result<Arc<dyn ItemRepository>, AppError> {
        self.registry
            .get(name)
            .ok_or_else(|| AppError::SourceNotFound(name.to_string()))
    }

    /// Starts a keeper over every configured source. Stopping it closes the
    /// store.
    pub fn start_keeper(&self) -> Result<SourceKeeper, AppError> {
        SourceKeeper::start(
            self.config.sources.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            self.config.keeper_config(),
        )
    }

    /// Closes the store for commands that run without a keeper.
    pub async fn close(&self) {
        self.registry.shutdown().await;
    }
}

async fn open_connection(storage: &StorageSection) -> Result<Arc<dyn DbConnection>, AppError> {
    match storage.adapter {
        StorageAdapter::Memory => {
            info!(folder = ?storage.folder, "Using in-memory storage");
            Ok(Arc::new(MemoryConnection::new(storage.folder.clone())))
        }
        StorageAdapter::Postgres => {
            let url = resolve_database_url(std::env::var("DATABASE_URL").ok(), storage)?;
            info!("Connecting to database...");
            let connection = PgConnection::connect(&url, &storage.db_config()).await?;
            Ok(Arc::new(connection))
        }
    }
}

/// `DATABASE_URL` wins over `storage.database_url`.
fn resolve_database_url(env: Option<String>, storage: &StorageSection) -> Result<String, AppError> {
    env.filter(|url| !url.trim().is_empty())
        .or_else(|| storage.database_url.clone())
        .ok_or_else(|| {
            AppError::ConfigError(
                "the postgres adapter needs DATABASE_URL or storage.database_url".to_string(),
            )
        })
}
