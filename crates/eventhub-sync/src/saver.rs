use std::sync::Arc;

use async_trait::async_trait;
use eventhub_client::BatchHandler;
use eventhub_core::models::Fields;
use eventhub_core::store::ItemRepository;
use eventhub_core::sync::{BatchStats, SaveOutcome};
use tracing::{debug, error, warn};

/// Stores imported records into one repository, keyed by the id field.
pub struct ItemSaver {
    repository: Arc<dyn ItemRepository>,
}

impl ItemSaver {
    pub fn new(repository: Arc<dyn ItemRepository>) -> Self {
        Self { repository }
    }

    async fn save_one(&self, source: &str, id_field: &str, record: &Fields) -> SaveOutcome {
        let Some(raw_key) = record.get(id_field) else {
            return SaveOutcome::MissingKey;
        };

        let key = raw_key.trim();
        if key.is_empty() {
            warn!(source, id_field, "Record skipped: empty key");
            return SaveOutcome::EmptyKey;
        }

        match self.repository.new_item(key, record.clone()).await {
            Ok(_) => SaveOutcome::Saved,
            Err(e) => {
                error!(source, item_key = key, error = %e, "Failed to store record");
                SaveOutcome::Failed
            }
        }
    }

    /// Saves a batch and returns per-outcome counters.
    pub async fn save_all(&self, source: &str, id_field: &str, batch: &[Fields]) -> BatchStats {
        let mut stats = BatchStats::new();
        for record in batch {
            stats.record(self.save_one(source, id_field, record).await);
        }
        debug!(
            source,
            saved = stats.saved,
            missing_key = stats.missing_key,
            empty_key = stats.empty_key,
            failed = stats.failed,
            "Batch stored"
        );
        stats
    }
}

#[async_trait]
impl BatchHandler for ItemSaver {
    async fn save_batch(&self, source: &str, id_field: &str, batch: &[Fields]) -> usize {
        self.save_all(source, id_field, batch).await.saved
    }
}
