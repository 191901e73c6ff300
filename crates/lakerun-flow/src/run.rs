//! Pipeline run tracking.
//!
//! A run represents one end-to-end execution of the external pipeline job,
//! capturing who asked for it, what input it processed, where its external
//! job can be polled, and how it ended.
//!
//! ## Lifecycle
//!
//! ```text
//! Submitted -> Queued -> Running -> { Succeeded, Failed }
//! ```
//!
//! Transitions are driven by out-of-band polling, so intermediate states
//! may be skipped (a fast job can go straight from `Submitted` to
//! `Succeeded`) or repeated at the external side. The state machine is
//! therefore ordered rather than edge-listed: any strictly forward move is
//! valid, any backward move is rejected, and terminal states are absorbing.
//!
//! Runs are never deleted; every run is a permanent, queryable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lakerun_core::RunId;

use crate::error::{Error, Result};
use crate::registry::StateUpdate;

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Trigger accepted, run row created.
    Submitted,
    /// External job accepted but not yet executing.
    Queued,
    /// External job is executing.
    Running,
    /// External job completed successfully.
    Succeeded,
    /// External job failed, was cancelled, or was deduplicated away.
    Failed,
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Position along the lifecycle; both terminal states share the last slot.
    const fn phase(self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Queued => 1,
            Self::Running => 2,
            Self::Succeeded | Self::Failed => 3,
        }
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// Forward jumps that skip intermediate states are allowed (poll-driven
    /// transitions may never observe `Queued` or `Running`); backward moves
    /// and any move out of a terminal state are not.
    #[must_use]
    pub const fn can_advance_to(&self, target: Self) -> bool {
        !self.is_terminal() && target.phase() > self.phase()
    }

    /// Stable string form, matching the persisted column values.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Submitted
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Unique run identifier, generated by the caller before persistence.
    pub id: RunId,
    /// Identity that requested the run.
    pub requested_by: String,
    /// Opaque reference naming the input dataset.
    pub input_ref: String,
    /// Polling URL returned by the external trigger call.
    ///
    /// Absent until the trigger succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,
    /// External job identifier, populated opportunistically during polling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_job_id: Option<String>,
    /// Current lifecycle state.
    pub state: RunState,
    /// When the run row was created.
    pub created_at: DateTime<Utc>,
    /// When the external job started executing (if observed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Last error text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// KPI snapshot, populated only on success and only if retrievable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpis: Option<serde_json::Value>,
}

impl Run {
    /// Creates a new run in the `Submitted` state.
    #[must_use]
    pub fn submitted(id: RunId, input_ref: impl Into<String>, requested_by: impl Into<String>) -> Self {
        Self {
            id,
            requested_by: requested_by.into(),
            input_ref: input_ref.into(),
            tracking_url: None,
            external_job_id: None,
            state: RunState::Submitted,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
            kpis: None,
        }
    }

    /// Attaches the tracking handle returned by the external trigger call.
    #[must_use]
    pub fn with_tracking_url(mut self, url: impl Into<String>) -> Self {
        self.tracking_url = Some(url.into());
        self
    }

    /// Returns true if the run is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Advances to a new state, applying the partial field update.
    ///
    /// Entering `Running` stamps `started_at`; entering a terminal state
    /// stamps `finished_at`. Fields carried in `update` are set only when
    /// provided, so repeated polls never churn timestamps or overwrite an
    /// opportunistically-captured external job ID with nothing. A KPI
    /// document is accepted only when the target is `Succeeded`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the target state is not
    /// strictly forward of the current one.
    #[tracing::instrument(skip(self, update), fields(run_id = %self.id, from = %self.state, to = %target))]
    pub fn advance_to(&mut self, target: RunState, update: StateUpdate) -> Result<()> {
        if !self.state.can_advance_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state,
                to: target,
            });
        }

        let now = Utc::now();
        if target == RunState::Running {
            self.started_at = Some(now);
        }
        if target.is_terminal() {
            self.finished_at = Some(now);
        }

        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        if let Some(job_id) = update.external_job_id {
            self.external_job_id = Some(job_id);
        }
        // KPI snapshots exist only on the success terminal state.
        if let Some(kpis) = update.kpis {
            if target == RunState::Succeeded {
                self.kpis = Some(kpis);
            }
        }

        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_valid() {
        assert!(RunState::Submitted.can_advance_to(RunState::Queued));
        assert!(RunState::Submitted.can_advance_to(RunState::Running));
        assert!(RunState::Submitted.can_advance_to(RunState::Succeeded));
        assert!(RunState::Queued.can_advance_to(RunState::Failed));
        assert!(RunState::Running.can_advance_to(RunState::Succeeded));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!RunState::Running.can_advance_to(RunState::Queued));
        assert!(!RunState::Queued.can_advance_to(RunState::Submitted));
        assert!(!RunState::Running.can_advance_to(RunState::Running));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [RunState::Succeeded, RunState::Failed] {
            assert!(terminal.is_terminal());
            for target in [
                RunState::Submitted,
                RunState::Queued,
                RunState::Running,
                RunState::Succeeded,
                RunState::Failed,
            ] {
                assert!(!terminal.can_advance_to(target));
            }
        }
    }

    #[test]
    fn advance_stamps_started_and_finished() -> Result<()> {
        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        assert!(run.started_at.is_none());

        run.advance_to(RunState::Running, StateUpdate::default())?;
        assert!(run.started_at.is_some());
        assert!(run.finished_at.is_none());

        run.advance_to(RunState::Succeeded, StateUpdate::default())?;
        assert!(run.finished_at.is_some());
        assert!(run.is_terminal());

        Ok(())
    }

    #[test]
    fn advance_rejects_backward_move() {
        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        run.advance_to(RunState::Running, StateUpdate::default())
            .expect("forward");

        let result = run.advance_to(RunState::Queued, StateUpdate::default());
        assert!(matches!(
            result,
            Err(Error::InvalidStateTransition { .. })
        ));
        assert_eq!(run.state, RunState::Running);
    }

    #[test]
    fn skipping_straight_to_terminal_sets_finished_only() -> Result<()> {
        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        run.advance_to(
            RunState::Failed,
            StateUpdate::default().with_error_message("external job reported Deduped"),
        )?;

        assert!(run.started_at.is_none());
        assert!(run.finished_at.is_some());
        assert_eq!(
            run.error_message.as_deref(),
            Some("external job reported Deduped")
        );
        Ok(())
    }

    #[test]
    fn partial_update_preserves_existing_fields() -> Result<()> {
        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        run.advance_to(
            RunState::Queued,
            StateUpdate::default().with_external_job_id("job-123"),
        )?;
        run.advance_to(RunState::Running, StateUpdate::default())?;

        assert_eq!(run.external_job_id.as_deref(), Some("job-123"));
        Ok(())
    }

    #[test]
    fn kpis_are_dropped_outside_success() -> Result<()> {
        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        run.advance_to(
            RunState::Failed,
            StateUpdate::default().with_kpis(serde_json::json!({"orders": 1})),
        )?;
        assert!(run.kpis.is_none());

        let mut run = Run::submitted(RunId::generate(), "import/sales.csv", "alice");
        run.advance_to(
            RunState::Succeeded,
            StateUpdate::default().with_kpis(serde_json::json!({"orders": 1})),
        )?;
        assert!(run.kpis.is_some());
        Ok(())
    }

    #[test]
    fn state_serializes_screaming_snake() {
        let json = serde_json::to_string(&RunState::Succeeded).expect("serialize");
        assert_eq!(json, "\"SUCCEEDED\"");
    }
}
