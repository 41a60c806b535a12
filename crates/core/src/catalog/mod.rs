//! Remote catalog access: the Bangumi API client and the validated
//! subject model.

mod client;
mod types;

pub use client::{BangumiClient, CatalogConfig, CatalogError, SubjectCatalog};
pub use types::{Episode, EpisodeType, FieldError, Subject, SubjectType, ValidationError};
