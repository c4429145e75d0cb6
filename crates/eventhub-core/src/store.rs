//! Record store contract.
//!
//! Storage backends live in `eventhub-db`; the keeper only sees these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Activity, Fields, Item, ItemActivities, ItemDetail};

/// Keyed item storage with a per-key activity log, scoped to one source.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Namespace this repository stores items for.
    fn repo_name(&self) -> &str;

    /// Creates (or fully replaces) the item stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::EmptyKey` if `key` is empty.
    async fn new_item(&self, key: &str, fields: Fields) -> Result<Item, AppError> {
        let item = Item::new(key, fields)?;
        self.set_item(&item).await?;
        Ok(item)
    }

    async fn set_item(&self, item: &Item) -> Result<(), AppError>;

    async fn get_item(&self, key: &str) -> Result<Option<Item>, AppError>;

    async fn get_item_detail(&self, key: &str) -> Result<Option<ItemDetail>, AppError> {
        let Some(item) = self.get_item(key).await? else {
            return Ok(None);
        };
        let activities = self
            .get_item_activities(key)
            .await?
            .unwrap_or_else(|| ItemActivities::new(key));
        Ok(Some(ItemDetail::new(item, activities)))
    }

    async fn items(&self) -> Result<Vec<Item>, AppError>;

    async fn len(&self) -> Result<usize, AppError>;

    async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len().await? == 0)
    }

    /// Activity log of `key`, newest first. `None` if the item is unknown.
    async fn get_item_activities(&self, key: &str) -> Result<Option<ItemActivities>, AppError>;

    /// Prepends `activity` to the log of `key` and returns the new log.
    /// `None` if the item is unknown, in which case nothing is stored.
    async fn add_item_activity(
        &self,
        key: &str,
        activity: Activity,
    ) -> Result<Option<ItemActivities>, AppError>;

    /// Flushes and releases the underlying storage. Safe to call twice.
    async fn close(&self) -> Result<(), AppError>;
}

/// Opens repositories by name on a storage backend.
#[async_trait]
pub trait DbConnection: Send + Sync {
    async fn init_repository(&self, name: &str) -> Result<Arc<dyn ItemRepository>, AppError>;

    /// Releases resources shared by every repository of this connection.
    /// Called once, after all repositories are closed.
    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}
