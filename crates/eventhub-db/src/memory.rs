//! In-memory item store with optional JSON snapshots.
//!
//! Each repository keeps its items and activity logs behind one
//! `parking_lot` lock. When the connection has a snapshot folder, a
//! repository reloads `<folder>/<name>.json` when opened and writes it back on
//! [`close`](ItemRepository::close).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventhub_core::error::AppError;
use eventhub_core::models::{Activity, Item, ItemActivities};
use eventhub_core::store::{DbConnection, ItemRepository};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Serialized form of one repository.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    items: BTreeMap<String, Item>,
    activities: BTreeMap<String, ItemActivities>,
}

pub struct MemoryRepository {
    name: String,
    snapshot_path: Option<PathBuf>,
    state: RwLock<Snapshot>,
    closed: AtomicBool,
}

impl MemoryRepository {
    /// Creates an empty repository that is never persisted.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(name.into(), None, Snapshot::default())
    }

    fn with_state(name: String, snapshot_path: Option<PathBuf>, state: Snapshot) -> Self {
        Self {
            name,
            snapshot_path,
            state: RwLock::new(state),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a repository backed by the snapshot at `path`, if it exists.
    async fn open(name: &str, path: PathBuf) -> Result<Self, AppError> {
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let snapshot: Snapshot = serde_json::from_str(&content)?;
                info!(
                    repository = name,
                    path = %path.display(),
                    items = snapshot.items.len(),
                    "Snapshot loaded"
                );
                snapshot
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(AppError::IoError(e)),
        };
        Ok(Self::with_state(name.to_string(), Some(path), state))
    }

    async fn write_snapshot(&self, path: &Path) -> Result<(), AppError> {
        let content = serde_json::to_string(&*self.state.read())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        debug!(repository = %self.name, path = %path.display(), "Snapshot written");
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for MemoryRepository {
    fn repo_name(&self) -> &str {
        &self.name
    }

    async fn set_item(&self, item: &Item) -> Result<(), AppError> {
        if item.key.is_empty() {
            return Err(AppError::EmptyKey);
        }
        self.state
            .write()
            .items
            .insert(item.key.clone(), item.clone());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Item>, AppError> {
        Ok(self.state.read().items.get(key).cloned())
    }

    async fn items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.state.read().items.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.state.read().items.len())
    }

    async fn get_item_activities(&self, key: &str) -> Result<Option<ItemActivities>, AppError> {
        let state = self.state.read();
        if !state.items.contains_key(key) {
            return Ok(None);
        }
        Ok(Some(
            state
                .activities
                .get(key)
                .cloned()
                .unwrap_or_else(|| ItemActivities::new(key)),
        ))
    }

    async fn add_item_activity(
        &self,
        key: &str,
        activity: Activity,
    ) -> Result<Option<ItemActivities>, AppError> {
        let mut state = self.state.write();
        if !state.items.contains_key(key) {
            return Ok(None);
        }
        let log = state
            .activities
            .entry(key.to_string())
            .or_insert_with(|| ItemActivities::new(key));
        log.prepend(activity);
        Ok(Some(log.clone()))
    }

    async fn close(&self) -> Result<(), AppError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match &self.snapshot_path {
            Some(path) => self.write_snapshot(path).await,
            None => Ok(()),
        }
    }
}

/// Opens [`MemoryRepository`] instances, one per name.
///
/// Opening the same name twice returns the same repository.
pub struct MemoryConnection {
    folder: Option<PathBuf>,
    repositories: Mutex<HashMap<String, Arc<MemoryRepository>>>,
}

impl MemoryConnection {
    pub fn new(folder: Option<PathBuf>) -> Self {
        Self {
            folder,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot_path(&self, name: &str) -> Option<PathBuf> {
        self.folder
            .as_ref()
            .map(|folder| folder.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl DbConnection for MemoryConnection {
    async fn init_repository(&self, name: &str) -> Result<Arc<dyn ItemRepository>, AppError> {
        let existing = self.repositories.lock().get(name).cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let repository = match self.snapshot_path(name) {
            Some(path) => MemoryRepository::open(name, path).await?,
            None => MemoryRepository::new(name),
        };

        let repository = self
            .repositories
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(repository))
            .clone();
        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eventhub_core::models::Fields;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_new_item_and_lookup() {
        let repo = MemoryRepository::new("members");
        repo.new_item("101", fields(&[("name", "Ann")]))
            .await
            .unwrap();

        let item = repo.get_item("101").await.unwrap().unwrap();
        assert_eq!(item.field("name"), Some("Ann"));
        assert!(repo.get_item("102").await.unwrap().is_none());
        assert_eq!(repo.len().await.unwrap(), 1);
        assert_eq!(repo.repo_name(), "members");
    }

    #[tokio::test]
    async fn test_new_item_rejects_empty_key() {
        let repo = MemoryRepository::new("members");
        let result = repo.new_item("", Fields::new()).await;
        assert!(matches!(result, Err(AppError::EmptyKey)));
        assert!(repo.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_reimport_overwrites_fields_and_keeps_activities() {
        let repo = MemoryRepository::new("members");
        repo.new_item("101", fields(&[("name", "Ann"), ("team", "red")]))
            .await
            .unwrap();
        repo.add_item_activity("101", Activity::new("checkin", Fields::new()))
            .await
            .unwrap();

        repo.new_item("101", fields(&[("name", "Anna")]))
            .await
            .unwrap();

        let item = repo.get_item("101").await.unwrap().unwrap();
        assert_eq!(item.fields, fields(&[("name", "Anna")]));
        let log = repo.get_item_activities("101").await.unwrap().unwrap();
        assert_eq!(log.activities.len(), 1);
    }

    #[tokio::test]
    async fn test_activities_are_newest_first() {
        let repo = MemoryRepository::new("members");
        repo.new_item("101", Fields::new()).await.unwrap();

        let first = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        repo.add_item_activity("101", Activity::at("checkin", Fields::new(), first))
            .await
            .unwrap();
        let log = repo
            .add_item_activity("101", Activity::at("checkout", Fields::new(), second))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(log.activities.len(), 2);
        assert_eq!(log.activities[0].action, "checkout");
        assert_eq!(log.activities[1].action, "checkin");
    }

    #[tokio::test]
    async fn test_activity_on_unknown_item_is_not_stored() {
        let repo = MemoryRepository::new("members");
        let result = repo
            .add_item_activity("404", Activity::new("checkin", Fields::new()))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(repo.get_item_activities("404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_item_detail_without_activities() {
        let repo = MemoryRepository::new("members");
        repo.new_item("101", fields(&[("name", "Ann")]))
            .await
            .unwrap();

        let detail = repo.get_item_detail("101").await.unwrap().unwrap();
        assert_eq!(detail.item.key, "101");
        assert!(detail.activities.is_empty());
        assert!(repo.get_item_detail("102").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_items_sorted_by_key() {
        let repo = MemoryRepository::new("members");
        for key in ["c", "a", "b"] {
            repo.new_item(key, Fields::new()).await.unwrap();
        }
        let keys: Vec<String> = repo
            .items()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_activities_on_one_key_are_all_kept() {
        let repo = Arc::new(MemoryRepository::new("members"));
        repo.new_item("101", Fields::new()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add_item_activity("101", Activity::new(format!("scan{}", i), Fields::new()))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let log = repo.get_item_activities("101").await.unwrap().unwrap();
        assert_eq!(log.activities.len(), 20);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("data");

        let connection = MemoryConnection::new(Some(folder.clone()));
        let repo = connection.init_repository("members").await.unwrap();
        repo.new_item("101", fields(&[("name", "Ann")]))
            .await
            .unwrap();
        repo.add_item_activity("101", Activity::new("checkin", fields(&[("gate", "north")])))
            .await
            .unwrap();
        repo.close().await.unwrap();
        assert!(folder.join("members.json").exists());

        let reopened = MemoryConnection::new(Some(folder));
        let repo = reopened.init_repository("members").await.unwrap();
        let detail = repo.get_item_detail("101").await.unwrap().unwrap();
        assert_eq!(detail.item.field("name"), Some("Ann"));
        assert_eq!(detail.activities.len(), 1);
        assert_eq!(detail.activities[0].properties["gate"], "north");
    }

    #[tokio::test]
    async fn test_close_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let connection = MemoryConnection::new(Some(dir.path().to_path_buf()));
        let repo = connection.init_repository("members").await.unwrap();

        repo.close().await.unwrap();
        let path = dir.path().join("members.json");
        std::fs::remove_file(&path).unwrap();

        repo.close().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("members.json"), "{ nope").unwrap();

        let connection = MemoryConnection::new(Some(dir.path().to_path_buf()));
        let result = connection.init_repository("members").await;
        assert!(matches!(result, Err(AppError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_same_name_returns_same_repository() {
        let connection = MemoryConnection::new(None);
        let first = connection.init_repository("members").await.unwrap();
        first.new_item("101", Fields::new()).await.unwrap();

        let second = connection.init_repository("members").await.unwrap();
        assert_eq!(second.len().await.unwrap(), 1);

        let other = connection.init_repository("guests").await.unwrap();
        assert!(other.is_empty().await.unwrap());
    }
}
