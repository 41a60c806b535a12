//! Mock series API for testing the uploader.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::upload::{CreateEpisode, CreateSeries, ReadEpisode, ReadSeries, SeriesApi, UploadError};

/// Mock implementation of [`SeriesApi`].
///
/// Records every created series and episode for assertions, hands out
/// sequential series ids, and can be told which catalog ids already exist
/// or to fail the next series creation.
#[derive(Debug)]
pub struct MockSeriesApi {
    existing: RwLock<HashSet<u32>>,
    created_series: RwLock<Vec<CreateSeries>>,
    created_episodes: RwLock<Vec<CreateEpisode>>,
    next_error: RwLock<Option<UploadError>>,
    next_series_id: AtomicU32,
}

impl Default for MockSeriesApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSeriesApi {
    /// Creates an empty mock with no pre-existing series.
    pub fn new() -> Self {
        Self {
            existing: RwLock::new(HashSet::new()),
            created_series: RwLock::new(Vec::new()),
            created_episodes: RwLock::new(Vec::new()),
            next_error: RwLock::new(None),
            next_series_id: AtomicU32::new(1),
        }
    }

    /// Marks a catalog id as already uploaded.
    pub async fn mark_existing(&self, bangumi_id: u32) {
        self.existing.write().await.insert(bangumi_id);
    }

    /// Makes the next `create_series` call fail with this error.
    pub async fn set_next_error(&self, error: UploadError) {
        *self.next_error.write().await = Some(error);
    }

    /// Every series creation request received.
    pub async fn created_series(&self) -> Vec<CreateSeries> {
        self.created_series.read().await.clone()
    }

    /// Every episode creation request received, across all bulk calls.
    pub async fn created_episodes(&self) -> Vec<CreateEpisode> {
        self.created_episodes.read().await.clone()
    }
}

#[async_trait]
impl SeriesApi for MockSeriesApi {
    async fn series_exists(&self, bangumi_id: u32) -> Result<bool, UploadError> {
        Ok(self.existing.read().await.contains(&bangumi_id))
    }

    async fn create_series(&self, series: &CreateSeries) -> Result<ReadSeries, UploadError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.created_series.write().await.push(series.clone());
        Ok(ReadSeries {
            id: self.next_series_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn create_episodes(
        &self,
        episodes: &[CreateEpisode],
    ) -> Result<Vec<ReadEpisode>, UploadError> {
        let mut created = self.created_episodes.write().await;
        created.extend_from_slice(episodes);
        Ok((1..=episodes.len() as u32)
            .map(|id| ReadEpisode { id })
            .collect())
    }
}
