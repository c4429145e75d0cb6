use std::collections::HashMap;
use std::sync::Arc;

use eventhub_core::error::AppError;
use eventhub_core::store::{DbConnection, ItemRepository};
use futures::future::{join_all, try_join_all};
use tracing::{error, info};

/// One open repository per configured source.
///
/// Repositories are opened eagerly so that a broken backend fails at startup
/// rather than during the first import.
pub struct RepositoryRegistry {
    connection: Arc<dyn DbConnection>,
    repositories: HashMap<String, Arc<dyn ItemRepository>>,
}

impl RepositoryRegistry {
    pub async fn open<I, S>(connection: Arc<dyn DbConnection>, names: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let opened = try_join_all(
            names
                .iter()
                .map(|name| connection.init_repository(name.as_str())),
        )
        .await?;

        info!(repositories = names.len(), "Repositories opened");
        Ok(Self {
            connection,
            repositories: names.into_iter().zip(opened).collect(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ItemRepository>> {
        self.repositories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.repositories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Closes every repository, then the connection. Failures are logged.
    pub async fn shutdown(&self) {
        let results = join_all(self.repositories.values().map(|repo| repo.close())).await;
        for (name, result) in self.repositories.keys().zip(results) {
            if let Err(e) = result {
                error!(repository = %name, error = %e, "Failed to close repository");
            }
        }
        if let Err(e) = self.connection.close().await {
            error!(error = %e, "Failed to close storage connection");
        }
    }
}
