//! Configuration for the remote job service and artifact endpoints.
//!
//! Values are read from environment variables via
//! [`JobServiceConfig::from_env`], with builder-style overrides for hosts
//! that wire configuration differently.

use serde::{Deserialize, Serialize};

/// Environment variable names.
mod env_keys {
    pub const API_BASE_URL: &str = "LAKERUN_API_BASE_URL";
    pub const DFS_BASE_URL: &str = "LAKERUN_DFS_BASE_URL";
    pub const WORKSPACE_ID: &str = "LAKERUN_WORKSPACE_ID";
    pub const PIPELINE_ITEM_ID: &str = "LAKERUN_PIPELINE_ITEM_ID";
    pub const LAKEHOUSE_ID: &str = "LAKERUN_LAKEHOUSE_ID";
    pub const OWNER_UPN: &str = "LAKERUN_OWNER_UPN";
    pub const OWNER_OBJECT_ID: &str = "LAKERUN_OWNER_OBJECT_ID";
}

const DEFAULT_API_BASE_URL: &str = "https://api.fabric.microsoft.com/v1";
const DEFAULT_DFS_BASE_URL: &str = "https://onelake.dfs.fabric.microsoft.com";

/// Connection settings for the remote job service and its lakehouse storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobServiceConfig {
    /// Jobs API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Storage DFS endpoint base URL.
    #[serde(default = "default_dfs_base_url")]
    pub dfs_base_url: String,
    /// Workspace containing the pipeline item and lakehouse.
    pub workspace_id: String,
    /// Pipeline item to trigger.
    pub pipeline_item_id: String,
    /// Lakehouse holding result artifacts.
    pub lakehouse_id: String,
    /// Principal name the job runs on behalf of.
    #[serde(default)]
    pub owner_upn: String,
    /// Object ID of the owning principal.
    #[serde(default)]
    pub owner_object_id: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_dfs_base_url() -> String {
    DEFAULT_DFS_BASE_URL.to_string()
}

impl JobServiceConfig {
    /// Creates a config with required identifiers and default endpoints.
    #[must_use]
    pub fn new(
        workspace_id: impl Into<String>,
        pipeline_item_id: impl Into<String>,
        lakehouse_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: default_api_base_url(),
            dfs_base_url: default_dfs_base_url(),
            workspace_id: workspace_id.into(),
            pipeline_item_id: pipeline_item_id.into(),
            lakehouse_id: lakehouse_id.into(),
            owner_upn: String::new(),
            owner_object_id: String::new(),
        }
    }

    /// Reads configuration from `LAKERUN_*` environment variables.
    ///
    /// Endpoint URLs fall back to the service defaults; identifiers default
    /// to empty strings and are expected to be validated by the host.
    #[must_use]
    pub fn from_env() -> Self {
        let get = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            api_base_url: get(env_keys::API_BASE_URL, DEFAULT_API_BASE_URL),
            dfs_base_url: get(env_keys::DFS_BASE_URL, DEFAULT_DFS_BASE_URL),
            workspace_id: get(env_keys::WORKSPACE_ID, ""),
            pipeline_item_id: get(env_keys::PIPELINE_ITEM_ID, ""),
            lakehouse_id: get(env_keys::LAKEHOUSE_ID, ""),
            owner_upn: get(env_keys::OWNER_UPN, ""),
            owner_object_id: get(env_keys::OWNER_OBJECT_ID, ""),
        }
    }

    /// Overrides the jobs API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Overrides the storage DFS base URL.
    #[must_use]
    pub fn with_dfs_base_url(mut self, url: impl Into<String>) -> Self {
        self.dfs_base_url = url.into();
        self
    }

    /// Sets the owning principal fields passed to trigger calls.
    #[must_use]
    pub fn with_owner(
        mut self,
        upn: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        self.owner_upn = upn.into();
        self.owner_object_id = object_id.into();
        self
    }
}
