//! Second-stage pipeline: re-upload crawled subjects to a sagasu core
//! deployment.

mod client;
mod config;
mod runner;
mod types;

pub use client::{SagasuApiClient, SeriesApi, UploadError};
pub use config::UploadConfig;
pub use runner::Uploader;
pub use types::{episodes_for, CreateEpisode, CreateSeries, ReadEpisode, ReadSeries};
