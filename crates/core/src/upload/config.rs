//! Uploader configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for an upload run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum number of in-flight file uploads.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Directory holding the crawled per-id files.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
}

fn default_parallel() -> usize {
    8
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            source_dir: default_source_dir(),
        }
    }
}
