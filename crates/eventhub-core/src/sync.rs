//! Import bookkeeping types.
//!
//! Pure counters and result records shared by the source client, the batch
//! saver and the keeper, decoupled from I/O.

/// Outcome of saving a single imported record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Record stored under its key
    Saved,
    /// Record has no id field - silently ignored
    MissingKey,
    /// Id field present but blank - skipped
    EmptyKey,
    /// Store rejected the record
    Failed,
}

/// Statistics for saving one batch of records.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub saved: usize,
    pub missing_key: usize,
    pub empty_key: usize,
    pub failed: usize,
}

impl BatchStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Saved => self.saved += 1,
            SaveOutcome::MissingKey => self.missing_key += 1,
            SaveOutcome::EmptyKey => self.empty_key += 1,
            SaveOutcome::Failed => self.failed += 1,
        }
    }

    /// Returns the total number of processed records.
    pub fn total(&self) -> usize {
        self.saved + self.missing_key + self.empty_key + self.failed
    }

    /// Returns the number of records that were not stored.
    pub fn skipped(&self) -> usize {
        self.missing_key + self.empty_key + self.failed
    }
}

/// Progress of one source import.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Pages fetched from the source.
    pub pages: usize,
    /// Records received across all pages.
    pub records: usize,
    /// Records the batch handler accepted.
    pub accepted: usize,
}

impl ImportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one fetched page.
    pub fn add_page(&mut self, records: usize, accepted: usize) {
        self.pages += 1;
        self.records += records;
        self.accepted += accepted;
    }

    pub fn rejected(&self) -> usize {
        self.records.saturating_sub(self.accepted)
    }
}

/// Result of one import run, as reported back to the keeper.
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// Source name.
    pub source: String,
    /// Counters gathered before the import finished or failed.
    pub summary: ImportSummary,
    /// Error message if the import failed, None if successful.
    pub error: Option<String>,
}

impl ImportResult {
    /// Creates a successful import result.
    pub fn success(source: String, summary: ImportSummary) -> Self {
        Self {
            source,
            summary,
            error: None,
        }
    }

    /// Creates a failed import result.
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            summary: ImportSummary::default(),
            error: Some(error),
        }
    }

    /// Returns true if the import was successful.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
