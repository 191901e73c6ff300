//! Append-only audit trail of run events.
//!
//! Every lifecycle-relevant fact about a run — status changes, released
//! locks, restore warnings — lands here, so the audit trail reflects what
//! happened even when a caller's immediate return value was discarded.
//!
//! The append-only guarantee is structural: the [`EventLog`] trait exposes
//! no update or delete operation on existing rows, so no implementation can
//! be asked to mutate history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lakerun_core::{EventId, RunId};

use crate::error::{Error, Result};

/// Classification of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// The run moved to a new lifecycle state.
    StatusChange,
    /// Informational note.
    Log,
    /// Something degraded but the run continued.
    Warning,
    /// A lifecycle-relevant failure.
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatusChange => f.write_str("STATUS_CHANGE"),
            Self::Log => f.write_str("LOG"),
            Self::Warning => f.write_str("WARNING"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// An immutable fact about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// The run this event belongs to.
    pub run_id: RunId,
    /// When the event occurred.
    pub at: DateTime<Utc>,
    /// Event classification.
    pub kind: EventKind,
    /// Free-text message.
    pub message: String,
}

/// Insert-only event storage.
///
/// Backing-store failures propagate as
/// [`crate::error::Error::StoreUnavailable`] — an append never fails
/// silently.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event for a run.
    async fn append(&self, run_id: RunId, kind: EventKind, message: &str) -> Result<Event>;

    /// Lists a run's events in chronological order.
    ///
    /// Ordering is by timestamp, ties broken by insertion order, so events
    /// written under clock skew still come back in a stable sequence.
    async fn list(&self, run_id: RunId) -> Result<Vec<Event>>;
}

/// In-memory event log for testing.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    rows: RwLock<Vec<(u64, Event)>>,
    next_seq: AtomicU64,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryEventLog {
    /// Creates a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event with an explicit timestamp.
    ///
    /// Exists so tests can model clock skew between writers; production
    /// callers go through [`EventLog::append`].
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn append_at(
        &self,
        run_id: RunId,
        at: DateTime<Utc>,
        kind: EventKind,
        message: &str,
    ) -> Result<Event> {
        let event = Event {
            id: EventId::generate(),
            run_id,
            at,
            kind,
            message: message.to_string(),
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut rows = self.rows.write().map_err(poison_err)?;
            rows.push((seq, event.clone()));
        }
        Ok(event)
    }

    /// Total number of events across all runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn event_count(&self) -> Result<usize> {
        let count = {
            let rows = self.rows.read().map_err(poison_err)?;
            rows.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, run_id: RunId, kind: EventKind, message: &str) -> Result<Event> {
        self.append_at(run_id, Utc::now(), kind, message)
    }

    async fn list(&self, run_id: RunId) -> Result<Vec<Event>> {
        let mut matching: Vec<(u64, Event)> = {
            let rows = self.rows.read().map_err(poison_err)?;
            rows.iter()
                .filter(|(_, event)| event.run_id == run_id)
                .cloned()
                .collect()
        };
        matching.sort_by(|(seq_a, a), (seq_b, b)| a.at.cmp(&b.at).then_with(|| seq_a.cmp(seq_b)));
        Ok(matching.into_iter().map(|(_, event)| event).collect())
    }
}
