//! Core library of the sagasu spider: a bounded-concurrency pipeline that
//! fetches subjects from the Bangumi catalog, validates and persists them
//! to per-id JSON files, and later re-uploads them to a sagasu core
//! deployment.

pub mod catalog;
pub mod config;
pub mod gate;
pub mod retry;
pub mod spider;
pub mod store;
pub mod testing;
pub mod upload;

pub use catalog::{
    BangumiClient, CatalogConfig, CatalogError, Episode, EpisodeType, FieldError, Subject,
    SubjectCatalog, SubjectType, ValidationError,
};
pub use config::{load_config, load_config_from_str, Config, ConfigError, RetryConfig};
pub use gate::{ConcurrencyGate, GateError, Permit};
pub use retry::{with_retry, BackoffPolicy, Classify, FailureClass, Jitter, RetryPolicy};
pub use spider::{IdRange, Spider, SpiderConfig, SpiderProgress};
pub use store::{PersistOutcome, StoreError, SubjectStore};
pub use upload::{
    episodes_for, CreateEpisode, CreateSeries, ReadEpisode, ReadSeries, SagasuApiClient,
    SeriesApi, UploadConfig, UploadError, Uploader,
};
