//! Spider configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for a catalog sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderConfig {
    /// First subject id to fetch.
    #[serde(default = "default_begin")]
    pub begin: u32,

    /// One past the last subject id. `None` sweeps without bound.
    #[serde(default)]
    pub end: Option<u32>,

    /// Maximum number of in-flight fetch tasks.
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Directory the per-id files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_begin() -> u32 {
    1
}

fn default_parallel() -> usize {
    8
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            begin: default_begin(),
            end: None,
            parallel: default_parallel(),
            output_dir: default_output_dir(),
        }
    }
}
