//! Scripted in-memory pipeline client for testing.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{PipelineClient, PollResponse, TriggerReceipt, TriggerRequest};
use crate::error::{Error, Result};

/// In-memory pipeline client for testing.
///
/// Trigger calls are recorded and assigned synthetic tracking URLs; poll
/// calls drain a scripted queue of responses. Both sides can be told to
/// fail to exercise the orchestrator's error paths.
///
/// ## Example
///
/// ```rust
/// use lakerun_flow::client::memory::InMemoryPipelineClient;
///
/// let client = InMemoryPipelineClient::new();
/// client.push_poll_status("InProgress");
/// client.push_poll_status("Completed");
/// // Use client in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPipelineClient {
    state: Mutex<ClientState>,
}

#[derive(Debug, Default)]
struct ClientState {
    triggers: Vec<TriggerRequest>,
    polls: VecDeque<PollResponse>,
    fail_next_trigger: bool,
    fail_polls: bool,
}

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

impl InMemoryPipelineClient {
    /// Creates a new client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a poll response with just a status string.
    pub fn push_poll_status(&self, status: &str) {
        self.push_poll_response(PollResponse::bare(status));
    }

    /// Queues a full poll response.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn push_poll_response(&self, response: PollResponse) {
        self.state
            .lock()
            .expect("client state lock")
            .polls
            .push_back(response);
    }

    /// Makes the next trigger call fail with `TriggerRejected`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn fail_next_trigger(&self) {
        self.state.lock().expect("client state lock").fail_next_trigger = true;
    }

    /// Makes every poll call fail with `PollUnavailable` until cleared.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    pub fn set_fail_polls(&self, fail: bool) {
        self.state.lock().expect("client state lock").fail_polls = fail;
    }

    /// Trigger requests observed so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn triggers(&self) -> Vec<TriggerRequest> {
        self.state.lock().expect("client state lock").triggers.clone()
    }

    /// Number of trigger calls observed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (test-only type).
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.state.lock().expect("client state lock").triggers.len()
    }
}

#[async_trait]
impl PipelineClient for InMemoryPipelineClient {
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerReceipt> {
        let mut state = self.state.lock().map_err(poison_err)?;

        if state.fail_next_trigger {
            state.fail_next_trigger = false;
            drop(state);
            return Err(Error::TriggerRejected {
                message: "scripted rejection".into(),
            });
        }

        state.triggers.push(request.clone());
        let tracking_url = format!("memory://jobs/{}", request.run_id);
        drop(state);

        Ok(TriggerReceipt { tracking_url })
    }

    async fn poll(&self, _tracking_url: &str) -> Result<PollResponse> {
        let mut state = self.state.lock().map_err(poison_err)?;

        if state.fail_polls {
            drop(state);
            return Err(Error::PollUnavailable {
                message: "scripted outage".into(),
            });
        }

        let response = state.polls.pop_front();
        drop(state);

        // An exhausted script keeps reporting in-progress, like a quiet job.
        Ok(response.unwrap_or_else(|| PollResponse::bare("InProgress")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakerun_core::RunId;

    fn request() -> TriggerRequest {
        TriggerRequest {
            run_id: RunId::generate(),
            input_ref: "import/sales.csv".into(),
            requested_by: "alice".into(),
        }
    }

    #[tokio::test]
    async fn trigger_records_and_returns_handle() -> Result<()> {
        let client = InMemoryPipelineClient::new();
        let req = request();

        let receipt = client.trigger(&req).await?;
        assert!(receipt.tracking_url.contains(&req.run_id.to_string()));
        assert_eq!(client.trigger_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn scripted_trigger_failure() -> Result<()> {
        let client = InMemoryPipelineClient::new();
        client.fail_next_trigger();

        let result = client.trigger(&request()).await;
        assert!(matches!(result, Err(Error::TriggerRejected { .. })));
        assert_eq!(client.trigger_count(), 0);

        // Only the next call fails.
        assert!(client.trigger(&request()).await.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn polls_drain_in_order_then_idle() -> Result<()> {
        let client = InMemoryPipelineClient::new();
        client.push_poll_status("NotStarted");
        client.push_poll_status("Completed");

        assert_eq!(client.poll("memory://x").await?.status, "NotStarted");
        assert_eq!(client.poll("memory://x").await?.status, "Completed");
        assert_eq!(client.poll("memory://x").await?.status, "InProgress");

        Ok(())
    }

    #[tokio::test]
    async fn poll_outage_is_poll_unavailable() -> Result<()> {
        let client = InMemoryPipelineClient::new();
        client.set_fail_polls(true);

        let result = client.poll("memory://x").await;
        assert!(matches!(result, Err(Error::PollUnavailable { .. })));

        client.set_fail_polls(false);
        assert!(client.poll("memory://x").await.is_ok());

        Ok(())
    }
}
