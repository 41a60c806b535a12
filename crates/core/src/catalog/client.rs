//! Bangumi catalog API client.
//!
//! Subjects are fetched from `GET /subject/{id}` with the `large` response
//! group, which inlines the episode list. No authentication is required.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::retry::{Classify, FailureClass};

/// Catalog API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL (default: https://api.bgm.tv).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.bgm.tv".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Errors from a single catalog call, classified for the retry loop.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level failure: connection, DNS, timeout.
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("catalog rejected request: HTTP {status} for {url}")]
    RejectedStatus { status: u16, url: String },

    /// The response body was not the JSON we asked for.
    #[error("failed to decode catalog response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl Classify for CatalogError {
    fn class(&self) -> FailureClass {
        match self {
            Self::Transport(_) => FailureClass::Transport,
            Self::RejectedStatus { .. } => FailureClass::RejectedStatus,
            Self::Decode(_) => FailureClass::Other,
        }
    }
}

/// Source of raw subject payloads, keyed by id.
///
/// The production implementation is [`BangumiClient`]; tests substitute
/// `testing::MockCatalog`.
#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    /// Fetches the raw payload for one subject id.
    async fn subject(&self, id: u32) -> Result<Value, CatalogError>;
}

/// HTTP client for the Bangumi catalog API.
pub struct BangumiClient {
    client: Client,
    base_url: String,
}

impl BangumiClient {
    /// Creates a new catalog client.
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(CatalogError::Transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SubjectCatalog for BangumiClient {
    async fn subject(&self, id: u32) -> Result<Value, CatalogError> {
        let url = format!("{}/subject/{}", self.base_url, id);

        debug!("Fetching subject {}: {}", id, url);

        let response = self
            .client
            .get(&url)
            .query(&[("responseGroup", "large")])
            .send()
            .await
            .map_err(CatalogError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RejectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        response.json().await.map_err(CatalogError::Decode)
    }
}
