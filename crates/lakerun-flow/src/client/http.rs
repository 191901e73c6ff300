//! HTTP implementation of the pipeline client against the item-jobs API.
//!
//! This module provides [`JobsApiClient`], a production implementation of
//! the [`PipelineClient`] trait over the remote jobs REST API.
//!
//! ## Protocol
//!
//! - **Trigger**: `POST {api}/workspaces/{ws}/items/{item}/jobs/instances`
//!   with an `executionData` payload; the service answers `202 Accepted`
//!   and a `Location` header naming the job instance, which becomes the
//!   run's tracking handle.
//! - **Poll**: `GET {tracking_url}`; `200` carries the status in the body,
//!   `202` means the instance is still in progress.
//!
//! ## Usage
//!
//! This module is only compiled when the `http` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! lakerun-flow = { version = "0.1", features = ["http"] }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{PipelineClient, PollResponse, TriggerReceipt, TriggerRequest};
use crate::config::JobServiceConfig;
use crate::error::{Error, Result};

/// Token scope requested from a [`TokenProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    /// Jobs API resource.
    JobsApi,
    /// Storage (DFS) resource.
    Storage,
}

/// Supplies bearer tokens for outbound calls.
///
/// The client-credentials cache behind this seam is an external
/// collaborator; implementations are expected to return an unexpired token
/// per scope.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token for the given scope.
    async fn bearer_token(&self, scope: TokenScope) -> Result<String>;
}

/// Timeout for trigger calls.
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for poll calls.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP pipeline client for the item-jobs API.
pub struct JobsApiClient<T> {
    http: reqwest::Client,
    config: JobServiceConfig,
    tokens: T,
}

impl<T: TokenProvider> JobsApiClient<T> {
    /// Creates a new client.
    #[must_use]
    pub fn new(config: JobServiceConfig, tokens: T) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens,
        }
    }

    fn trigger_url(&self) -> String {
        format!(
            "{}/workspaces/{}/items/{}/jobs/instances?jobType=Pipeline",
            self.config.api_base_url, self.config.workspace_id, self.config.pipeline_item_id
        )
    }
}

#[async_trait]
impl<T: TokenProvider> PipelineClient for JobsApiClient<T> {
    #[tracing::instrument(skip(self, request), fields(run_id = %request.run_id))]
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerReceipt> {
        let token = self.tokens.bearer_token(TokenScope::JobsApi).await?;

        let payload = json!({
            "executionData": {
                "OwnerUserPrincipalName": self.config.owner_upn,
                "OwnerUserObjectId": self.config.owner_object_id,
                "parameters": {
                    "input_file": request.input_ref,
                    "run_id": request.run_id.to_string(),
                    "requested_by": request.requested_by,
                },
            }
        });

        let response = self
            .http
            .post(self.trigger_url())
            .bearer_auth(token)
            .json(&payload)
            .timeout(TRIGGER_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::TriggerRejected {
                message: format!("trigger request failed: {e}"),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(500).collect();
            return Err(Error::TriggerRejected {
                message: format!("trigger returned {status}: {snippet}"),
            });
        }

        let tracking_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::TriggerRejected {
                message: "trigger accepted but no Location header returned".into(),
            })?;

        tracing::info!(%tracking_url, "pipeline triggered");
        Ok(TriggerReceipt { tracking_url })
    }

    #[tracing::instrument(skip(self))]
    async fn poll(&self, tracking_url: &str) -> Result<PollResponse> {
        if tracking_url.is_empty() {
            return Err(Error::PollUnavailable {
                message: "no tracking URL to poll".into(),
            });
        }

        let token = self.tokens.bearer_token(TokenScope::JobsApi).await?;
        let response = self
            .http
            .get(tracking_url)
            .bearer_auth(token)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::PollUnavailable {
                message: format!("poll request failed: {e}"),
            })?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let payload: serde_json::Value =
                    response.json().await.map_err(|e| Error::PollUnavailable {
                        message: format!("poll body unreadable: {e}"),
                    })?;
                let status = payload
                    .get("status")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();
                Ok(PollResponse { status, payload })
            }
            // The service answers 202 while the instance is still running;
            // a body may or may not be present.
            reqwest::StatusCode::ACCEPTED => {
                let payload: serde_json::Value = response.json().await.unwrap_or_default();
                let status = payload
                    .get("status")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("InProgress")
                    .to_string();
                Ok(PollResponse { status, payload })
            }
            other => {
                let body = response.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(500).collect();
                Err(Error::PollUnavailable {
                    message: format!("poll returned {other}: {snippet}"),
                })
            }
        }
    }
}
