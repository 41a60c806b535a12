//! HTTP client for the sagasu core API.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::ValidationError;

use super::types::{CreateEpisode, CreateSeries, ReadEpisode, ReadSeries};

/// Errors that can occur while uploading one crawled file.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Network-level failure.
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// The upload API answered with a non-success status.
    #[error("upload API rejected request: HTTP {status} for {url}")]
    RejectedStatus { status: u16, url: String },

    /// The response body could not be decoded.
    #[error("failed to decode upload API response: {0}")]
    Decode(#[source] reqwest::Error),

    /// A source file could not be read.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file was not valid JSON.
    #[error("failed to parse {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A source file did not hold a valid subject.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// The series-side API the uploader talks to.
///
/// The production implementation is [`SagasuApiClient`]; tests substitute
/// `testing::MockSeriesApi`.
#[async_trait]
pub trait SeriesApi: Send + Sync {
    /// Whether a series for this catalog id is already present.
    async fn series_exists(&self, bangumi_id: u32) -> Result<bool, UploadError>;

    /// Creates a series and returns its new id.
    async fn create_series(&self, series: &CreateSeries) -> Result<ReadSeries, UploadError>;

    /// Creates episodes in one bulk call.
    async fn create_episodes(
        &self,
        episodes: &[CreateEpisode],
    ) -> Result<Vec<ReadEpisode>, UploadError>;
}

#[derive(Serialize)]
struct BulkEpisodes<'a> {
    bulk: &'a [CreateEpisode],
}

/// HTTP client for a sagasu core deployment.
pub struct SagasuApiClient {
    client: Client,
    base_url: String,
}

impl SagasuApiClient {
    /// Creates a client against the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploadError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SeriesApi for SagasuApiClient {
    async fn series_exists(&self, bangumi_id: u32) -> Result<bool, UploadError> {
        let url = format!("{}/api/series/bgm/{}", self.base_url, bangumi_id);
        // A failed probe counts as absent; the create call will surface a
        // real problem if there is one.
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                debug!("Existence probe failed for subject {}: {}", bangumi_id, e);
                Ok(false)
            }
        }
    }

    async fn create_series(&self, series: &CreateSeries) -> Result<ReadSeries, UploadError> {
        let url = format!("{}/api/series", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(series)
            .send()
            .await
            .map_err(UploadError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::RejectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        response.json().await.map_err(UploadError::Decode)
    }

    async fn create_episodes(
        &self,
        episodes: &[CreateEpisode],
    ) -> Result<Vec<ReadEpisode>, UploadError> {
        let url = format!("{}/api/episodes/bulk", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&BulkEpisodes { bulk: episodes })
            .send()
            .await
            .map_err(UploadError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::RejectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        response.json().await.map_err(UploadError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = SagasuApiClient::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_bulk_body_shape() {
        let episodes = vec![CreateEpisode {
            name: "ep".to_string(),
            name_cn: None,
            sort: 1.0,
            kind: crate::catalog::EpisodeType::Main,
            series: 3,
            air_date: None,
        }];
        let body = serde_json::to_value(BulkEpisodes { bulk: &episodes }).unwrap();
        assert!(body["bulk"].is_array());
        assert_eq!(body["bulk"][0]["series"], 3);
    }
}
