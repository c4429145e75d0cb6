//! Per-source scheduling state owned by the keeper loop.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Shortest distance between two scheduled runs of one source.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchedule {
    /// Earliest moment the next scheduled import may start.
    pub next_run: DateTime<Utc>,
    pub importing: bool,
}

/// Scheduling state for every registered source.
///
/// Only the keeper loop holds a `Schedule`, so no method takes a lock.
#[derive(Debug, Default)]
pub struct Schedule {
    sources: HashMap<String, SourceSchedule>,
}

impl Schedule {
    /// Every source becomes eligible at `now`.
    pub fn new<I, S>(names: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources = names
            .into_iter()
            .map(|name| {
                (
                    name.into(),
                    SourceSchedule {
                        next_run: now,
                        importing: false,
                    },
                )
            })
            .collect();
        Self { sources }
    }

    pub fn get(&self, name: &str) -> Option<&SourceSchedule> {
        self.sources.get(name)
    }

    /// One source that is due at `now` and not importing, if any.
    pub fn pick_due(&self, now: DateTime<Utc>) -> Option<&str> {
        self.sources
            .iter()
            .find(|(_, state)| !state.importing && state.next_run <= now)
            .map(|(name, _)| name.as_str())
    }

    /// Marks `name` as importing.
    ///
    /// Returns false, leaving the state untouched, if the source is unknown
    /// or already importing.
    pub fn begin(&mut self, name: &str) -> bool {
        match self.sources.get_mut(name) {
            Some(state) if !state.importing => {
                state.importing = true;
                true
            }
            _ => false,
        }
    }

    /// Clears the importing flag and pushes the next run `interval` past the
    /// previous one. Returns the new next run.
    ///
    /// Intervals shorter than [`MIN_SYNC_INTERVAL`] are raised to it.
    pub fn complete(&mut self, name: &str, interval: Duration) -> Option<DateTime<Utc>> {
        let state = self.sources.get_mut(name)?;
        state.importing = false;
        let step = chrono::Duration::from_std(interval.max(MIN_SYNC_INTERVAL))
            .unwrap_or(chrono::Duration::MAX);
        state.next_run = state
            .next_run
            .checked_add_signed(step)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(state.next_run)
    }
}
