//! External pipeline job client.
//!
//! This module defines the consumed interface to the remote job service:
//!
//! - [`PipelineClient`]: Trait for triggering the job and polling its status
//! - [`map_job_status`]: Total mapping from the external status vocabulary
//!   to the internal lifecycle
//! - [`memory::InMemoryPipelineClient`]: Scripted client for testing
//!
//! ## Status Mapping
//!
//! The external service speaks its own vocabulary, which is not closed from
//! our side: new status strings can appear without notice. The mapping is
//! therefore total, with a conservative default — an unrecognized status is
//! treated as "still in progress" rather than silently closing out a run.
//! The mapping is not injective; several external stop reasons all land on
//! `Failed`.

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lakerun_core::RunId;

use crate::error::Result;
use crate::run::RunState;

/// Parameters handed to the external trigger call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    /// Run identifier, passed through as a job parameter so the external
    /// side can tag its outputs.
    pub run_id: RunId,
    /// Opaque reference naming the input dataset, or a promote-style
    /// reference for restores.
    pub input_ref: String,
    /// Identity that requested the run.
    pub requested_by: String,
}

/// Receipt from a successful trigger call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReceipt {
    /// Opaque polling handle for the started job instance.
    pub tracking_url: String,
}

/// One status observation from the external job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    /// Raw status string in the external vocabulary.
    pub status: String,
    /// Full response payload, kept for opportunistic field extraction.
    pub payload: serde_json::Value,
}

impl PollResponse {
    /// Creates a response with an empty payload.
    #[must_use]
    pub fn bare(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// External job instance identifier, when the payload carries one.
    #[must_use]
    pub fn external_job_id(&self) -> Option<String> {
        self.payload
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    /// Failure detail, when the payload carries one.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.payload
            .get("failureReason")
            .and_then(|reason| reason.get("message"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }
}

/// Client for the externally-executed pipeline job.
///
/// Consumed, not implemented, by the coordination core; the trait is the
/// seam where a real jobs API, or a scripted test double, plugs in.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// Triggers a new job instance.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::TriggerRejected`] when the external
    /// system refuses the job.
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerReceipt>;

    /// Polls the job instance once.
    ///
    /// One-shot: repetition and overall watch timeouts belong to the
    /// caller's scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::PollUnavailable`] when the status
    /// check itself fails; the run's state is unaffected.
    async fn poll(&self, tracking_url: &str) -> Result<PollResponse>;
}

/// Maps an external job status string to the internal lifecycle state.
///
/// Total over arbitrary input: anything unrecognized maps to
/// [`RunState::Running`], so a single unmapped status can never prematurely
/// close out a run.
#[must_use]
pub fn map_job_status(external: &str) -> RunState {
    match external {
        "NotStarted" => RunState::Queued,
        "InProgress" => RunState::Running,
        "Completed" => RunState::Succeeded,
        "Failed" | "Cancelled" | "Deduped" => RunState::Failed,
        _ => RunState::Running,
    }
}
