//! The upload pipeline.
//!
//! Walks a directory of crawled subject files and pushes each anime
//! subject to the series API, one task per file under the same
//! [`ConcurrencyGate`] discipline as the spider: acquire before spawn,
//! permit rides with the task, wait for idleness after the last dispatch.
//! A failure in one file never disturbs the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::catalog::{Subject, SubjectType};
use crate::gate::ConcurrencyGate;

use super::client::{SeriesApi, UploadError};
use super::config::UploadConfig;
use super::types::{episodes_for, CreateSeries};

/// The upload driver.
pub struct Uploader<A: SeriesApi + 'static> {
    config: UploadConfig,
    api: Arc<A>,
    gate: Arc<ConcurrencyGate>,
}

impl<A: SeriesApi + 'static> Uploader<A> {
    /// Creates an uploader over the given API.
    pub fn new(config: UploadConfig, api: Arc<A>) -> Self {
        let gate = ConcurrencyGate::new(config.parallel);
        Self { config, api, gate }
    }

    /// Uploads every crawled file in the source directory, in name order.
    /// Returns the number of files dispatched once all tasks have
    /// finished. Fails only when the directory itself cannot be listed.
    pub async fn run(&self) -> Result<u64, UploadError> {
        let files = list_subject_files(&self.config.source_dir).await?;

        info!(
            "Starting upload of {} files from {}",
            files.len(),
            self.config.source_dir.display()
        );

        let mut dispatched: u64 = 0;
        for path in files {
            let permit = self.gate.acquire().await;
            dispatched += 1;

            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = process_file(api.as_ref(), &path).await {
                    warn!("Failed to upload {}: {}", path.display(), e);
                }
            });
        }

        let _ = self.gate.wait_idle(None).await;

        info!("Upload finished, {} files dispatched", dispatched);
        Ok(dispatched)
    }
}

/// Lists the `*.json` files of a directory, sorted by name.
async fn list_subject_files(dir: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| UploadError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| UploadError::Io {
        path: dir.to_path_buf(),
        source: e,
    })? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Uploads one crawled file: parse, filter, existence check, create.
async fn process_file<A>(api: &A, path: &Path) -> Result<(), UploadError>
where
    A: SeriesApi + ?Sized,
{
    info!("Processing file {}", path.display());

    let raw = fs::read_to_string(path).await.map_err(|e| UploadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| UploadError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let subject = Subject::from_value(&value)?;

    if subject.kind != SubjectType::Anime {
        debug!("Skipping non-anime subject {}", subject.id);
        return Ok(());
    }

    if api.series_exists(subject.id).await? {
        debug!("Series for subject {} already uploaded", subject.id);
        return Ok(());
    }

    let series = api.create_series(&CreateSeries::from_subject(&subject)).await?;

    let episodes = episodes_for(&subject, series.id);
    if episodes.is_empty() {
        info!("Uploaded subject {} as series {}", subject.id, series.id);
        return Ok(());
    }

    let created = api.create_episodes(&episodes).await?;
    info!(
        "Uploaded subject {} as series {} with {} episodes",
        subject.id,
        series.id,
        created.len()
    );
    Ok(())
}
