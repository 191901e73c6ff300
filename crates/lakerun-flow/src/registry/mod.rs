//! Durable storage for run rows.
//!
//! The [`RunRegistry`] trait defines the persistence layer for runs: one
//! row per run, written only by the orchestrator, readable by anyone.
//!
//! ## Design Principles
//!
//! - **Partial updates**: State transitions carry only the fields relevant
//!   to that transition via [`StateUpdate`]
//! - **Forward-only**: The registry itself rejects updates that would move
//!   a run backward, so transitions are totally ordered per run regardless
//!   of how many pollers race
//! - **Cooperative uniqueness**: At most one non-terminal run is expected
//!   at a time, enforced by the run lock rather than a registry constraint;
//!   the registry tolerates extra non-terminal rows transiently (e.g. right
//!   after a crash, before administrative cleanup)

pub mod memory;

use async_trait::async_trait;

use lakerun_core::RunId;

use crate::error::Result;
use crate::run::{Run, RunState};

/// Fields attached to a state transition, each set only when relevant.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Error text to record, if any.
    pub error_message: Option<String>,
    /// External job identifier captured from a poll payload.
    pub external_job_id: Option<String>,
    /// KPI document to persist alongside a success transition.
    pub kpis: Option<serde_json::Value>,
}

impl StateUpdate {
    /// Attaches an error message.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Attaches the external job identifier.
    #[must_use]
    pub fn with_external_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.external_job_id = Some(job_id.into());
        self
    }

    /// Attaches a KPI document.
    #[must_use]
    pub fn with_kpis(mut self, kpis: serde_json::Value) -> Self {
        self.kpis = Some(kpis);
        self
    }
}

/// Storage abstraction for run rows.
///
/// All operations may fail transiently with
/// [`crate::error::Error::StoreUnavailable`]; callers treat that as
/// retryable, never as a lifecycle event.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// Inserts a new run in its initial state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::DuplicateRun`] if the identifier
    /// already exists. Identifiers are caller-generated, so this is a real
    /// possibility rather than just a bug guard.
    async fn create(&self, run: &Run) -> Result<()>;

    /// Applies a state transition with a partial field update.
    ///
    /// Entering `Running` stamps the start timestamp; entering a terminal
    /// state stamps the finish timestamp; `update` fields are written only
    /// when provided.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::RunNotFound`] for an unknown run and
    /// [`crate::error::Error::InvalidStateTransition`] for any update that
    /// would move the run backward (or out of a terminal state).
    async fn update_state(
        &self,
        run_id: RunId,
        new_state: RunState,
        update: StateUpdate,
    ) -> Result<Run>;

    /// Gets a run by ID, or `None` if it does not exist.
    async fn get(&self, run_id: RunId) -> Result<Option<Run>>;

    /// Returns the run currently in a non-terminal state, newest first if
    /// more than one exists transiently.
    async fn get_active(&self) -> Result<Option<Run>>;

    /// Returns the most recently finished run in the `Succeeded` state.
    async fn latest_succeeded(&self) -> Result<Option<Run>>;

    /// Lists runs newest-first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Run>>;
}
