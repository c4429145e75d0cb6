//! The keeper: one control loop that schedules imports and replays scans.
//!
//! The loop owns the [`Schedule`] and is the only task that mutates it. It
//! multiplexes a stop signal, a ticker, a bounded import-request queue, a
//! bounded replay queue and the completion of the workers it spawns. Imports
//! and pushes run in short-lived tasks tracked by a `JoinSet`, so the loop
//! itself never waits on the network.
//!
//! A replay that fails in transport is put back on the replay queue
//! unchanged. There is no retry limit and no backoff. A replay whose update
//! URL cannot be built is dropped, since no retry can change the outcome.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eventhub_client::{SourceClient, Transport};
use eventhub_core::config::KeeperConfig;
use eventhub_core::error::AppError;
use eventhub_core::models::{Activity, Fields, Item, ItemDetail};
use eventhub_core::source::SourceDescriptor;
use eventhub_core::store::ItemRepository;
use eventhub_core::sync::ImportResult;
use eventhub_db::RepositoryRegistry;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::saver::ItemSaver;
use crate::schedule::Schedule;

/// A recorded activity waiting to be pushed back to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEvent {
    pub source: String,
    pub key: String,
    pub activity: Activity,
}

/// State shared between the loop and every handle.
struct Shared {
    clients: HashMap<String, Arc<SourceClient>>,
    registry: Arc<RepositoryRegistry>,
    import_tx: mpsc::Sender<String>,
    replay_tx: mpsc::Sender<ReplayEvent>,
}

impl Shared {
    fn repository(&self, source: &str) -> Option<Arc<dyn ItemRepository>> {
        if !self.clients.contains_key(source) {
            return None;
        }
        self.registry.get(source)
    }
}

/// Cloneable entry point to a running keeper.
#[derive(Clone)]
pub struct KeeperHandle {
    shared: Arc<Shared>,
}

impl KeeperHandle {
    /// Registered source names, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Queues an on-demand import, waiting for queue capacity.
    ///
    /// Returns false for an unknown source or a stopped keeper. A request for
    /// a source that is already importing is accepted here and rejected by
    /// the loop.
    pub async fn start_import(&self, source: &str) -> bool {
        if !self.shared.clients.contains_key(source) {
            warn!(source, "Import requested for unknown source");
            return false;
        }
        self.shared
            .import_tx
            .send(source.to_string())
            .await
            .is_ok()
    }

    /// Records a scan on `key` and queues its replay.
    ///
    /// Returns the updated item, or `None` when the keeper is stopped, the
    /// source or item is unknown, or the store fails. Nothing is recorded in
    /// those cases. A scan that is recorded always gets its replay queued.
    pub async fn scan(
        &self,
        source: &str,
        key: &str,
        action: &str,
        properties: Fields,
    ) -> Option<ItemDetail> {
        let repository = self.shared.repository(source)?;

        // shutdown waits for this slot before closing the store
        let Ok(permit) = self.shared.replay_tx.reserve().await else {
            debug!(source, item_key = key, "Scan ignored: keeper stopped");
            return None;
        };

        let activity = Activity::new(action, properties);
        match repository.add_item_activity(key, activity.clone()).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(source, item_key = key, "Scan on unknown item");
                return None;
            }
            Err(e) => {
                error!(source, item_key = key, error = %e, "Failed to record scan");
                return None;
            }
        }

        permit.send(ReplayEvent {
            source: source.to_string(),
            key: key.to_string(),
            activity,
        });

        self.get_item_detail(source, key).await
    }

    pub async fn get_item_detail(&self, source: &str, key: &str) -> Option<ItemDetail> {
        let repository = self.shared.repository(source)?;
        match repository.get_item_detail(key).await {
            Ok(detail) => detail,
            Err(e) => {
                error!(source, item_key = key, error = %e, "Failed to read item");
                None
            }
        }
    }

    pub async fn get_items(&self, source: &str) -> Vec<Item> {
        let Some(repository) = self.shared.repository(source) else {
            return Vec::new();
        };
        repository.items().await.unwrap_or_else(|e| {
            error!(source, error = %e, "Failed to list items");
            Vec::new()
        })
    }
}

/// A running keeper. Dropping it without [`stop`](Self::stop) also ends the
/// loop, but skips waiting for it.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use eventhub_client::HttpTransport;
/// use eventhub_core::config::{HttpConfig, KeeperConfig};
/// use eventhub_core::SourceDescriptor;
/// use eventhub_db::{MemoryConnection, RepositoryRegistry};
/// use eventhub_sync::SourceKeeper;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sources = vec![SourceDescriptor::new(
///     "members",
///     "field_qrcode",
///     "https://example.com/sample?offset=%offset%&limit=%size%",
///     "https://example.com/sample/%key%",
/// )];
/// let registry = RepositoryRegistry::open(Arc::new(MemoryConnection::new(None)), ["members"]).await?;
/// let transport = Arc::new(HttpTransport::new(&HttpConfig::default())?);
///
/// let keeper = SourceKeeper::start(sources, Arc::new(registry), transport, KeeperConfig::default())?;
/// keeper.handle().start_import("members").await;
/// keeper.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SourceKeeper {
    handle: KeeperHandle,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SourceKeeper {
    /// Spawns the control loop. Every source becomes due immediately, so the
    /// first tick imports one of them.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a source has no usable update URL
    /// template, and `AppError::SourceNotFound` if a source has no repository
    /// in `registry`.
    pub fn start(
        sources: Vec<SourceDescriptor>,
        registry: Arc<RepositoryRegistry>,
        transport: Arc<dyn Transport>,
        config: KeeperConfig,
    ) -> Result<Self, AppError> {
        let mut clients = HashMap::with_capacity(sources.len());
        for descriptor in sources {
            descriptor
                .check_update_url()
                .map_err(|e| AppError::ConfigError(e.to_string()))?;
            if !registry.contains(&descriptor.name) {
                return Err(AppError::SourceNotFound(descriptor.name));
            }
            let client = SourceClient::new(descriptor, Arc::clone(&transport))
                .with_page_size(config.page_size);
            clients.insert(client.name().to_string(), Arc::new(client));
        }

        let (import_tx, import_rx) = mpsc::channel(config.import_queue_capacity.max(1));
        let (replay_tx, replay_rx) = mpsc::channel(config.replay_queue_capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        let shared = Arc::new(Shared {
            clients,
            registry,
            import_tx,
            replay_tx,
        });

        let control = ControlLoop {
            schedule: Schedule::new(shared.clients.keys().cloned(), Utc::now()),
            shared: Arc::clone(&shared),
            config,
            workers: JoinSet::new(),
        };
        let task = tokio::spawn(control.run(stop_rx, import_rx, replay_rx));

        Ok(Self {
            handle: KeeperHandle { shared },
            stop_tx,
            task,
        })
    }

    pub fn handle(&self) -> KeeperHandle {
        self.handle.clone()
    }

    /// Signals the loop to stop and waits until it has drained its queues,
    /// joined its workers and closed the store.
    pub async fn stop(self) {
        let Self { stop_tx, task, .. } = self;
        // the loop may already be gone
        let _ = stop_tx.send(());
        if let Err(e) = task.await {
            error!(error = %e, "Keeper loop ended abnormally");
        }
    }
}

enum WorkerOutcome {
    Import(ImportResult),
    Replay,
}

struct ControlLoop {
    shared: Arc<Shared>,
    schedule: Schedule,
    config: KeeperConfig,
    workers: JoinSet<WorkerOutcome>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut stop_rx: oneshot::Receiver<()>,
        mut import_rx: mpsc::Receiver<String>,
        mut replay_rx: mpsc::Receiver<ReplayEvent>,
    ) {
        let tick = self.config.tick_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sources = self.shared.clients.len(),
            tick_ms = tick.as_millis() as u64,
            sync_interval_secs = self.config.sync_interval.as_secs(),
            "Keeper started"
        );

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                Some(event) = replay_rx.recv() => self.spawn_replay(event),
                Some(source) = import_rx.recv() => self.spawn_import(source),
                _ = ticker.tick() => self.on_tick(),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    self.on_worker_done(joined);
                }
            }
        }

        self.shutdown(import_rx, replay_rx).await;
    }

    fn on_tick(&mut self) {
        let Some(source) = self.schedule.pick_due(Utc::now()).map(str::to_string) else {
            return;
        };
        match self.shared.import_tx.try_send(source) {
            Ok(()) => {}
            Err(TrySendError::Full(source)) => {
                warn!(source = %source, "Import queue full, scheduled import skipped");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn spawn_import(&mut self, source: String) {
        let (Some(client), Some(repository)) = (
            self.shared.clients.get(&source).cloned(),
            self.shared.registry.get(&source),
        ) else {
            warn!(source = %source, "Import request for unknown source dropped");
            return;
        };

        if !self.schedule.begin(&source) {
            info!(source = %source, "Import already running, request rejected");
            return;
        }

        self.workers.spawn(async move {
            let saver = ItemSaver::new(repository);
            let result = match AssertUnwindSafe(client.import(&saver)).catch_unwind().await {
                Ok(Ok(summary)) => ImportResult::success(source, summary),
                Ok(Err(e)) => ImportResult::failure(source, e.to_string()),
                Err(_) => ImportResult::failure(source, "import worker panicked".to_string()),
            };
            WorkerOutcome::Import(result)
        });
    }

    fn spawn_replay(&mut self, event: ReplayEvent) {
        let Some(client) = self.shared.clients.get(&event.source).cloned() else {
            warn!(source = %event.source, item_key = %event.key, "Replay for unknown source dropped");
            return;
        };
        let replay_tx = self.shared.replay_tx.clone();

        self.workers.spawn(async move {
            match client
                .try_push(&event.key, &event.activity.replay_properties())
                .await
            {
                Ok(()) => {
                    debug!(source = %event.source, item_key = %event.key, action = %event.activity.action, "Replay delivered");
                    return WorkerOutcome::Replay;
                }
                Err(e @ AppError::InvalidUrl(_)) => {
                    error!(
                        source = %event.source,
                        item_key = %event.key,
                        action = %event.activity.action,
                        error = %e,
                        "Replay dropped: no update URL for this key"
                    );
                    return WorkerOutcome::Replay;
                }
                Err(e) => error!(
                    source = %event.source,
                    item_key = %event.key,
                    action = %event.activity.action,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Replay failed, requeued"
                ),
            }
            if let Err(mpsc::error::SendError(event)) = replay_tx.send(event).await {
                error!(
                    source = %event.source,
                    item_key = %event.key,
                    action = %event.activity.action,
                    "Replay undelivered: keeper stopping"
                );
            }
            WorkerOutcome::Replay
        });
    }

    fn on_worker_done(&mut self, joined: Result<WorkerOutcome, JoinError>) {
        match joined {
            Ok(WorkerOutcome::Import(result)) => {
                let next_run = self
                    .schedule
                    .complete(&result.source, self.config.sync_interval);
                match &result.error {
                    None => info!(
                        source = %result.source,
                        pages = result.summary.pages,
                        records = result.summary.records,
                        accepted = result.summary.accepted,
                        next_run = ?next_run,
                        "Import completed"
                    ),
                    Some(e) => error!(
                        source = %result.source,
                        error = %e,
                        next_run = ?next_run,
                        "Import failed"
                    ),
                }
            }
            Ok(WorkerOutcome::Replay) => {}
            Err(e) if e.is_panic() => error!(error = %e, "Keeper worker panicked"),
            Err(e) => warn!(error = %e, "Keeper worker cancelled"),
        }
    }

    async fn shutdown(
        mut self,
        mut import_rx: mpsc::Receiver<String>,
        mut replay_rx: mpsc::Receiver<ReplayEvent>,
    ) {
        info!("Keeper stopping");
        import_rx.close();
        replay_rx.close();

        while let Ok(source) = import_rx.try_recv() {
            info!(source = %source, "Queued import discarded");
        }

        // waits for scans still holding a reserved slot
        let mut undelivered = 0usize;
        while let Some(event) = replay_rx.recv().await {
            let delivered = match self.shared.clients.get(&event.source) {
                Some(client) => {
                    client
                        .push(&event.key, &event.activity.replay_properties())
                        .await
                }
                None => false,
            };
            if !delivered {
                undelivered += 1;
                error!(
                    source = %event.source,
                    item_key = %event.key,
                    action = %event.activity.action,
                    "Replay undelivered at shutdown"
                );
            }
        }

        while let Some(joined) = self.workers.join_next().await {
            self.on_worker_done(joined);
        }

        self.shared.registry.shutdown().await;
        info!(undelivered, "Keeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_client::stub::StubTransport;
    use eventhub_core::store::DbConnection;
    use eventhub_db::MemoryConnection;
    use std::future::Future;

    const FETCHING_URL: &str = "http://stub.com/members?offset=%offset%&limit=%size%";
    const UPDATE_URL: &str = "http://stub.com/members/%key%?op=scan";

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("members", "field_qrcode", FETCHING_URL, UPDATE_URL)
    }

    fn config(tick: Duration) -> KeeperConfig {
        KeeperConfig {
            tick_interval: tick,
            sync_interval: Duration::from_secs(3600),
            page_size: 2,
            replay_queue_capacity: 30,
            import_queue_capacity: 2,
        }
    }

    fn page(next: &str, keys: &[&str]) -> String {
        let data: Vec<String> = keys
            .iter()
            .map(|k| format!(r#"{{"field_qrcode": "{}", "name": "member {}"}}"#, k, k))
            .collect();
        format!(
            r#"{{"links": {{"next": "{}"}}, "data": [{}]}}"#,
            next,
            data.join(",")
        )
    }

    /// Serves `A,B` then `C`.
    fn two_pages(stub: &StubTransport) {
        let first = descriptor().fetching_url(0, 2);
        let second = descriptor().fetching_url(2, 2);
        stub.route(&first, page(&second, &["A", "B"]));
        stub.route(&second, page("", &["C"]));
    }

    async fn registry(connection: MemoryConnection) -> Arc<RepositoryRegistry> {
        Arc::new(
            RepositoryRegistry::open(Arc::new(connection), ["members"])
                .await
                .unwrap(),
        )
    }

    async fn start(stub: Arc<StubTransport>, tick: Duration) -> SourceKeeper {
        let registry = registry(MemoryConnection::new(None)).await;
        SourceKeeper::start(vec![descriptor()], registry, stub, config(tick)).unwrap()
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn gate_north() -> Fields {
        let mut props = Fields::new();
        props.insert("gate".to_string(), "north".to_string());
        props
    }

    #[tokio::test]
    async fn test_import_then_scan_end_to_end() {
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        let keeper = start(stub.clone(), Duration::from_secs(3600)).await;
        let handle = keeper.handle();

        assert!(handle.start_import("members").await);
        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;

        for key in ["A", "B", "C"] {
            let detail = handle.get_item_detail("members", key).await.unwrap();
            assert!(detail.activities.is_empty());
        }

        let detail = handle
            .scan("members", "A", "checkin", gate_north())
            .await
            .unwrap();
        assert_eq!(detail.item.key, "A");
        assert_eq!(detail.item.field("name"), Some("member A"));
        assert_eq!(detail.activities.len(), 1);
        assert_eq!(detail.activities[0].action, "checkin");
        assert_eq!(detail.activities[0].properties["gate"], "north");

        eventually(|| async { stub.sends().len() == 1 }).await;
        let (_, url) = &stub.sends()[0];
        assert!(url.starts_with("http://stub.com/members/A?"));
        assert!(url.contains("gate=north"));
        assert!(url.contains("op=scan"));
        assert!(url.contains("checkin="));

        keeper.stop().await;
    }

    #[tokio::test]
    async fn test_scan_unknown_key_records_nothing() {
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        let keeper = start(stub.clone(), Duration::from_secs(3600)).await;
        let handle = keeper.handle();

        handle.start_import("members").await;
        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;

        assert!(handle
            .scan("members", "Z", "checkin", Fields::new())
            .await
            .is_none());
        assert!(handle
            .scan("guests", "A", "checkin", Fields::new())
            .await
            .is_none());
        assert!(handle.get_item_detail("members", "Z").await.is_none());

        keeper.stop().await;
        assert!(stub.sends().is_empty());
    }

    #[tokio::test]
    async fn test_failed_replay_is_retried_with_same_event() {
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        stub.fail_next_sends(2);
        let keeper = start(stub.clone(), Duration::from_secs(3600)).await;
        let handle = keeper.handle();

        handle.start_import("members").await;
        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;
        handle.scan("members", "B", "checkin", gate_north()).await.unwrap();

        eventually(|| async { stub.sends().len() == 3 }).await;
        let sends = stub.sends();
        assert!(sends.iter().all(|send| send == &sends[0]));

        keeper.stop().await;
        assert_eq!(stub.sends().len(), 3);
    }

    #[tokio::test]
    async fn test_ticker_imports_due_source() {
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        let keeper = start(stub.clone(), Duration::from_millis(10)).await;
        let handle = keeper.handle();

        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;
        keeper.stop().await;
    }

    #[tokio::test]
    async fn test_start_import_unknown_source() {
        let stub = Arc::new(StubTransport::new());
        let keeper = start(stub.clone(), Duration::from_secs(3600)).await;

        assert!(!keeper.handle().start_import("guests").await);
        assert!(keeper.handle().get_items("guests").await.is_empty());
        assert_eq!(keeper.handle().sources(), vec!["members"]);

        keeper.stop().await;
        assert!(stub.gets().is_empty());
    }

    #[tokio::test]
    async fn test_import_while_importing_is_rejected() {
        let stub = Arc::new(StubTransport::gated());
        two_pages(&stub);
        let keeper = start(stub.clone(), Duration::from_secs(3600)).await;
        let handle = keeper.handle();

        assert!(handle.start_import("members").await);
        stub.wait_entered().await;

        assert!(handle.start_import("members").await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        stub.release();
        stub.wait_entered().await;
        stub.release();

        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stub.gets().len(), 2);

        keeper.stop().await;
    }

    #[tokio::test]
    async fn test_start_rejects_source_without_repository() {
        let stub = Arc::new(StubTransport::new());
        let registry = registry(MemoryConnection::new(None)).await;
        let guests = SourceDescriptor::new("guests", "id", FETCHING_URL, UPDATE_URL);

        let result = SourceKeeper::start(
            vec![descriptor(), guests],
            registry,
            stub,
            config(Duration::from_secs(3600)),
        );
        assert!(matches!(result, Err(AppError::SourceNotFound(ref name)) if name == "guests"));
    }

    #[tokio::test]
    async fn test_start_rejects_source_without_update_template() {
        let stub = Arc::new(StubTransport::new());
        let registry = registry(MemoryConnection::new(None)).await;
        let no_template = SourceDescriptor::new("members", "field_qrcode", FETCHING_URL, "");

        let result = SourceKeeper::start(
            vec![no_template],
            registry,
            stub,
            config(Duration::from_secs(3600)),
        );
        assert!(matches!(
            result,
            Err(AppError::ConfigError(ref msg)) if msg.contains("update_url")
        ));
    }

    #[tokio::test]
    async fn test_replay_without_buildable_url_is_dropped() {
        let stub = Arc::new(StubTransport::new());
        // the key lands in the host, so only some keys yield a valid URL
        let by_host =
            SourceDescriptor::new("members", "field_qrcode", FETCHING_URL, "http://%key%/scan");
        let registry = registry(MemoryConnection::new(None)).await;
        let keeper = SourceKeeper::start(
            vec![by_host],
            registry,
            stub.clone(),
            config(Duration::from_secs(3600)),
        )
        .unwrap();
        let handle = keeper.handle();

        let repository = handle.shared.repository("members").unwrap();
        repository.new_item("bad host", Fields::new()).await.unwrap();
        repository.new_item("stub.com", Fields::new()).await.unwrap();

        let detail = handle
            .scan("members", "bad host", "checkin", Fields::new())
            .await
            .unwrap();
        assert_eq!(detail.activities.len(), 1);
        handle
            .scan("members", "stub.com", "checkin", Fields::new())
            .await
            .unwrap();

        eventually(|| async { stub.sends().len() == 1 }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sends = stub.sends();
        assert_eq!(sends.len(), 1);
        assert!(sends[0].1.starts_with("http://stub.com/scan?"));

        keeper.stop().await;
    }

    #[tokio::test]
    async fn test_scans_racing_stop_are_saved_and_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        let registry = registry(MemoryConnection::new(Some(dir.path().to_path_buf()))).await;
        let keeper = SourceKeeper::start(
            vec![descriptor()],
            registry,
            stub.clone(),
            config(Duration::from_secs(3600)),
        )
        .unwrap();
        let handle = keeper.handle();

        handle.start_import("members").await;
        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;

        let scans: Vec<_> = (0..20)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle
                        .scan("members", "A", &format!("scan{}", i), Fields::new())
                        .await
                        .is_some()
                })
            })
            .collect();
        keeper.stop().await;

        let mut answered = 0;
        for scan in scans {
            if scan.await.unwrap() {
                answered += 1;
            }
        }

        let reopened = MemoryConnection::new(Some(dir.path().to_path_buf()));
        let saved = reopened
            .init_repository("members")
            .await
            .unwrap()
            .get_item_detail("A")
            .await
            .unwrap()
            .unwrap()
            .activities
            .len();
        assert!(saved >= answered);
        assert_eq!(stub.sends().len(), saved);
    }

    #[tokio::test]
    async fn test_stop_closes_store_and_refuses_scans() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubTransport::new());
        two_pages(&stub);
        let registry = registry(MemoryConnection::new(Some(dir.path().to_path_buf()))).await;
        let keeper = SourceKeeper::start(
            vec![descriptor()],
            registry,
            stub.clone(),
            config(Duration::from_secs(3600)),
        )
        .unwrap();
        let handle = keeper.handle();

        handle.start_import("members").await;
        eventually(|| async { handle.get_items("members").await.len() == 3 }).await;
        keeper.stop().await;

        assert!(dir.path().join("members.json").exists());
        assert!(handle
            .scan("members", "A", "checkin", Fields::new())
            .await
            .is_none());
        assert!(!handle.start_import("members").await);
    }
}
