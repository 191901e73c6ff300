//! HTTP artifact store over the lakehouse DFS endpoint.
//!
//! This module provides [`DfsArtifactStore`], a production implementation
//! of the [`ArtifactStore`] trait reading small JSON artifacts written by
//! the external job.
//!
//! Retrieval problems degrade to `Ok(None)` rather than erroring: a missing
//! KPI document never fails the read path, it only exhausts one fallback
//! source. Only compiled with the `http` feature.

use std::time::Duration;

use async_trait::async_trait;

use super::{ArtifactStore, KpiSlot};
use crate::client::http::{TokenProvider, TokenScope};
use crate::config::JobServiceConfig;
use crate::error::Result;

/// Timeout for artifact reads.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Artifact reader against the lakehouse DFS endpoint.
pub struct DfsArtifactStore<T> {
    http: reqwest::Client,
    config: JobServiceConfig,
    tokens: T,
}

impl<T: TokenProvider> DfsArtifactStore<T> {
    /// Creates a new store.
    #[must_use]
    pub fn new(config: JobServiceConfig, tokens: T) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens,
        }
    }

    /// Full DFS URL for a lakehouse file path.
    fn file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{path}",
            self.config.dfs_base_url, self.config.workspace_id, self.config.lakehouse_id
        )
    }
}

#[async_trait]
impl<T: TokenProvider> ArtifactStore for DfsArtifactStore<T> {
    #[tracing::instrument(skip(self), fields(path = %slot.path()))]
    async fn read_kpis(&self, slot: &KpiSlot) -> Result<Option<serde_json::Value>> {
        let path = slot.path();
        let url = self.file_url(&path);

        let token = match self.tokens.bearer_token(TokenScope::Storage).await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(%path, error = %err, "token unavailable for artifact read");
                return Ok(None);
            }
        };

        let response = match self
            .http
            .get(url)
            .bearer_auth(token)
            .timeout(READ_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%path, error = %err, "artifact read failed");
                return Ok(None);
            }
        };

        match response.status() {
            reqwest::StatusCode::OK => match response.json().await {
                Ok(document) => Ok(Some(document)),
                Err(err) => {
                    tracing::warn!(%path, error = %err, "artifact body is not valid JSON");
                    Ok(None)
                }
            },
            reqwest::StatusCode::NOT_FOUND => {
                tracing::info!(%path, "artifact not found");
                Ok(None)
            }
            status => {
                tracing::warn!(%path, %status, "unexpected artifact response");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as FlowResult;

    struct StaticTokens;

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn bearer_token(&self, _scope: TokenScope) -> FlowResult<String> {
            Ok("test-token".into())
        }
    }

    #[test]
    fn file_url_nests_workspace_and_lakehouse() {
        let config = JobServiceConfig::new("ws-1", "item", "lake-2")
            .with_dfs_base_url("https://dfs.test.local");
        let store = DfsArtifactStore::new(config, StaticTokens);

        assert_eq!(
            store.file_url("Files/results/current/kpis.json"),
            "https://dfs.test.local/ws-1/lake-2/Files/results/current/kpis.json"
        );
    }
}
