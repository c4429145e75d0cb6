use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use eventhub_core::error::AppError;
use eventhub_core::models::Fields;
use eventhub_core::source::SourceDescriptor;
use eventhub_core::sync::ImportSummary;
use tracing::{debug, error, info, warn};

use crate::cursor::PageCursor;
use crate::transport::Transport;

/// Page size requested when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Receives every page fetched during an import.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    /// Stores `batch` for `source` and returns how many records were accepted.
    async fn save_batch(&self, source: &str, id_field: &str, batch: &[Fields]) -> usize;
}

/// Client for one configured source.
///
/// Imports are single-flight: while one runs, further calls to
/// [`import`](Self::import) fail with `AppError::ImportRunning` without any
/// network access.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use eventhub_client::{BatchHandler, HttpTransport, SourceClient};
/// use eventhub_core::{config::HttpConfig, Fields, SourceDescriptor};
///
/// struct Count;
///
/// #[async_trait::async_trait]
/// impl BatchHandler for Count {
///     async fn save_batch(&self, _source: &str, _id_field: &str, batch: &[Fields]) -> usize {
///         batch.len()
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let descriptor = SourceDescriptor::new(
///     "members",
///     "field_qrcode",
///     "https://example.com/sample?offset=%offset%&limit=%size%",
///     "https://example.com/sample/%key%",
/// );
/// let transport = Arc::new(HttpTransport::new(&HttpConfig::default())?);
/// let client = SourceClient::new(descriptor, transport);
/// let summary = client.import(&Count).await?;
/// println!("{} records in {} pages", summary.records, summary.pages);
/// # Ok(())
/// # }
/// ```
pub struct SourceClient {
    descriptor: SourceDescriptor,
    transport: Arc<dyn Transport>,
    page_size: usize,
    import_running: AtomicBool,
}

impl SourceClient {
    pub fn new(descriptor: SourceDescriptor, transport: Arc<dyn Transport>) -> Self {
        Self {
            descriptor,
            transport,
            page_size: DEFAULT_PAGE_SIZE,
            import_running: AtomicBool::new(false),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn is_importing(&self) -> bool {
        self.import_running.load(Ordering::Acquire)
    }

    /// Pulls every page of the source into `handler`.
    ///
    /// Pages handled before a failing fetch stay committed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImportRunning` if an import is already in progress,
    /// otherwise the first fetch error encountered.
    pub async fn import(&self, handler: &dyn BatchHandler) -> Result<ImportSummary, AppError> {
        let _running = RunningGuard::acquire(&self.import_running)
            .ok_or_else(|| AppError::ImportRunning(self.descriptor.name.clone()))?;

        info!(source = %self.descriptor.name, "Import started");

        let mut cursor = PageCursor::new(
            Arc::clone(&self.transport),
            self.descriptor.fetching_url(0, self.page_size),
        );
        let mut summary = ImportSummary::new();

        while cursor.has_next() {
            let url = cursor.next_url().to_string();
            let batch = match cursor.fetch_next().await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        source = %self.descriptor.name,
                        url = %url,
                        pages = summary.pages,
                        error = %e,
                        "Import aborted"
                    );
                    return Err(e);
                }
            };

            let accepted = handler
                .save_batch(&self.descriptor.name, &self.descriptor.id_field, batch)
                .await;
            summary.add_page(batch.len(), accepted);
            debug!(
                source = %self.descriptor.name,
                page = summary.pages,
                records = batch.len(),
                accepted,
                "Page imported"
            );
        }

        info!(
            source = %self.descriptor.name,
            pages = summary.pages,
            records = summary.records,
            accepted = summary.accepted,
            "Import finished"
        );
        Ok(summary)
    }

    /// Replays an event for `key` to the source.
    ///
    /// Returns false on any failure; the error is logged, never raised.
    pub async fn push(&self, key: &str, properties: &Fields) -> bool {
        match self.try_push(key, properties).await {
            Ok(()) => true,
            Err(e @ AppError::InvalidUrl(_)) => {
                error!(source = %self.descriptor.name, item_key = %key, error = %e, "Cannot build update URL");
                false
            }
            Err(e) => {
                warn!(
                    source = %self.descriptor.name,
                    item_key = %key,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Push failed"
                );
                false
            }
        }
    }

    /// Like [`push`](Self::push), but hands the failure back to the caller.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` when no update URL can be built for
    /// `key`, which no retry can fix, otherwise the transport error.
    pub async fn try_push(&self, key: &str, properties: &Fields) -> Result<(), AppError> {
        let url = self.descriptor.update_url(key, properties)?;
        self.transport
            .send(self.descriptor.update_method, url.as_str())
            .await?;
        debug!(source = %self.descriptor.name, item_key = %key, url = %url, "Push accepted");
        Ok(())
    }
}

/// Holds the running flag for the duration of an import.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
