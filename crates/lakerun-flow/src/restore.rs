//! Promoting a historical run's output back to the "current" position.
//!
//! A restore re-invokes the external job in promote mode: instead of
//! processing a fresh input file, the job copies the source run's archived
//! results over the current slot. The promotion run goes through the
//! ordinary start path — lock, registry row, events — so it is a
//! first-class run like any other.
//!
//! Restores are safety/recovery operations whose *attempt history* matters
//! as much as their success, so this is the one place that deliberately
//! logs failed intent instead of suppressing it: a [`RestoreRecord`] is
//! written even when the underlying trigger fails, with the resulting-run
//! field left absent.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lakerun_core::{RestoreId, RunId};

use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::orchestrator::RunOrchestrator;
use crate::run::RunState;

/// Input-reference prefix signalling "promote contents of source run"
/// rather than "process a fresh input file".
pub const RESTORE_INPUT_PREFIX: &str = "restore::";

/// Builds the promote-style input reference for a source run.
#[must_use]
pub fn restore_input_ref(source_run_id: RunId) -> String {
    format!("{RESTORE_INPUT_PREFIX}{source_run_id}")
}

/// Provenance of one promote action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRecord {
    /// Unique restore identifier.
    pub id: RestoreId,
    /// When the restore was attempted.
    pub restored_at: DateTime<Utc>,
    /// Identity that requested the restore.
    pub restored_by: String,
    /// The succeeded run whose output is being promoted.
    pub source_run_id: RunId,
    /// The promotion run, or `None` if the promote action failed to start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_run_id: Option<RunId>,
}

impl RestoreRecord {
    /// Creates a new record stamped with the current time.
    #[must_use]
    pub fn new(
        restored_by: impl Into<String>,
        source_run_id: RunId,
        resulting_run_id: Option<RunId>,
    ) -> Self {
        Self {
            id: RestoreId::generate(),
            restored_at: Utc::now(),
            restored_by: restored_by.into(),
            source_run_id,
            resulting_run_id,
        }
    }

    /// Returns true if the promote action started.
    #[must_use]
    pub const fn started(&self) -> bool {
        self.resulting_run_id.is_some()
    }
}

/// Insert-only storage for restore records.
///
/// Like the event log, the append-only guarantee is structural: there is no
/// update or delete operation to misuse.
#[async_trait]
pub trait RestoreLog: Send + Sync {
    /// Inserts a restore record.
    async fn record(&self, record: &RestoreRecord) -> Result<()>;

    /// Lists restore records, newest first.
    async fn list(&self, limit: usize) -> Result<Vec<RestoreRecord>>;
}

/// In-memory restore log for testing.
#[derive(Debug, Default)]
pub struct InMemoryRestoreLog {
    rows: RwLock<Vec<RestoreRecord>>,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryRestoreLog {
    /// Creates a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RestoreLog for InMemoryRestoreLog {
    async fn record(&self, record: &RestoreRecord) -> Result<()> {
        let mut rows = self.rows.write().map_err(poison_err)?;
        rows.push(record.clone());
        drop(rows);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<RestoreRecord>> {
        let mut rows: Vec<RestoreRecord> = {
            let rows = self.rows.read().map_err(poison_err)?;
            rows.clone()
        };
        rows.sort_by(|a, b| b.restored_at.cmp(&a.restored_at).then_with(|| b.id.cmp(&a.id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Coordinates promote-historical-result actions.
pub struct RestoreCoordinator {
    orchestrator: std::sync::Arc<RunOrchestrator>,
    restores: std::sync::Arc<dyn RestoreLog>,
}

impl RestoreCoordinator {
    /// Creates a new coordinator on top of the orchestrator's trigger
    /// primitive.
    #[must_use]
    pub fn new(
        orchestrator: std::sync::Arc<RunOrchestrator>,
        restores: std::sync::Arc<dyn RestoreLog>,
    ) -> Self {
        Self {
            orchestrator,
            restores,
        }
    }

    /// Promotes a succeeded run's output back to the current position.
    ///
    /// Preconditions are checked before any side effect: the source run
    /// must exist and be `Succeeded`, and the actor identity must be
    /// non-empty. A violation writes nothing.
    ///
    /// Once preconditions hold, intent is durably recorded no matter what:
    /// a failed start still inserts a record with no resulting run and
    /// appends a warning event on the source run. Inspect
    /// [`RestoreRecord::started`] to distinguish the two outcomes.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty actor or a non-succeeded source
    /// - [`Error::RunNotFound`] for an unknown source run
    /// - [`Error::StoreUnavailable`] if the restore log itself cannot be
    ///   written
    #[tracing::instrument(skip(self), fields(source_run_id = %source_run_id))]
    pub async fn restore(&self, source_run_id: RunId, actor: &str) -> Result<RestoreRecord> {
        if actor.trim().is_empty() {
            return Err(Error::validation("actor identity must not be empty"));
        }

        let Some(source) = self.orchestrator.registry.get(source_run_id).await? else {
            return Err(Error::RunNotFound {
                run_id: source_run_id,
            });
        };
        if source.state != RunState::Succeeded {
            return Err(Error::validation(format!(
                "only succeeded runs can be restored; run {source_run_id} is {}",
                source.state
            )));
        }

        let input_ref = restore_input_ref(source_run_id);
        match self.orchestrator.start(&input_ref, actor).await {
            Ok(new_run) => {
                let record = RestoreRecord::new(actor, source_run_id, Some(new_run.id));
                self.restores.record(&record).await?;
                tracing::info!(resulting_run_id = %new_run.id, "restore triggered");
                Ok(record)
            }
            Err(err) => {
                let record = RestoreRecord::new(actor, source_run_id, None);
                self.restores.record(&record).await?;
                if let Err(append_err) = self
                    .orchestrator
                    .events
                    .append(
                        source_run_id,
                        EventKind::Warning,
                        &format!("restore trigger failed: {err}"),
                    )
                    .await
                {
                    tracing::warn!(error = %append_err, "failed to record restore warning");
                }
                tracing::warn!(error = %err, "restore failed to start; intent recorded");
                Ok(record)
            }
        }
    }
}
