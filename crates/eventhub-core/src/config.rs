//! Configuration types for Event Hub components.
//!
//! Code defaults live in the `*Config` structs; the TOML file read by
//! [`load_config`] can override storage, logging, keeper timings and lists the
//! sources to keep in sync.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::source::SourceDescriptor;

/// Directory name used under the platform configuration directory.
pub const APP_NAME: &str = "eventhub";

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for source calls.
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "EventHub/0.1 (source-sync)".to_string(),
        }
    }
}

/// Keeper scheduling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperConfig {
    /// How often the keeper looks for a source due for import.
    pub tick_interval: Duration,
    /// Distance between two scheduled imports of the same source.
    pub sync_interval: Duration,
    /// Page size requested from sources during an import.
    pub page_size: usize,
    pub replay_queue_capacity: usize,
    pub import_queue_capacity: usize,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            sync_interval: Duration::from_secs(5 * 60),
            page_size: 200,
            replay_queue_capacity: 30,
            import_queue_capacity: 2,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageAdapter {
    #[default]
    #[serde(alias = "mem")]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub adapter: StorageAdapter,
    /// Snapshot folder for the memory adapter. No snapshots when unset.
    pub folder: Option<PathBuf>,
    /// Connection URL for the postgres adapter. `DATABASE_URL` takes precedence.
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
}

impl StorageSection {
    pub fn db_config(&self) -> DbConfig {
        let mut config = DbConfig::default();
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Optional overrides of [`KeeperConfig`], in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeeperSection {
    pub tick_interval_secs: Option<u64>,
    pub sync_interval_secs: Option<u64>,
    pub page_size: Option<usize>,
    pub replay_queue_capacity: Option<usize>,
    pub import_queue_capacity: Option<usize>,
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSection,
    pub logging: LoggingSection,
    pub keeper: KeeperSection,
    pub sources: Vec<SourceDescriptor>,
}

impl AppConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, AppError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Keeper settings with file overrides applied to the defaults.
    pub fn keeper_config(&self) -> KeeperConfig {
        let defaults = KeeperConfig::default();
        let section = &self.keeper;
        KeeperConfig {
            tick_interval: section
                .tick_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.tick_interval),
            sync_interval: section
                .sync_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            page_size: section.page_size.unwrap_or(defaults.page_size),
            replay_queue_capacity: section
                .replay_queue_capacity
                .unwrap_or(defaults.replay_queue_capacity)
                .max(1),
            import_queue_capacity: section
                .import_queue_capacity
                .unwrap_or(defaults.import_queue_capacity)
                .max(1),
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Rejects configurations the keeper cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::ConfigError(
                    "source name must not be empty".to_string(),
                ));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
            if source.id_field.trim().is_empty() {
                return Err(AppError::ConfigError(format!(
                    "source {} has an empty id_field",
                    source.name
                )));
            }
            if !source.fetching_url.contains("://") {
                return Err(AppError::ConfigError(format!(
                    "source {} has an invalid fetching_url: {}",
                    source.name, source.fetching_url
                )));
            }
            source
                .check_update_url()
                .map_err(|e| AppError::ConfigError(e.to_string()))?;
        }
        if self.keeper.tick_interval_secs == Some(0) {
            return Err(AppError::ConfigError(
                "keeper.tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.keeper.sync_interval_secs == Some(0) {
            return Err(AppError::ConfigError(
                "keeper.sync_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration path: `<config_dir>/eventhub/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Reads and validates the configuration file at `path`.
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the file is missing, unreadable or invalid.
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config = AppConfig::from_toml(&content)?;
    tracing::debug!(
        path = %path.display(),
        sources = config.sources.len(),
        "Configuration loaded"
    );
    Ok(config)
}
