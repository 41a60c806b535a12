//! Payload types for the series upload API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{EpisodeType, Subject};

/// Request body for `POST /api/series`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSeries {
    pub name: String,
    pub name_cn: Option<String>,
    pub description: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub bangumi_id: u32,
}

/// The slice of a created series the uploader consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadSeries {
    pub id: u32,
}

/// One entry of the `POST /api/episodes/bulk` request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateEpisode {
    pub name: String,
    pub name_cn: Option<String>,
    pub sort: f64,
    #[serde(rename = "type")]
    pub kind: EpisodeType,
    pub series: u32,
    pub air_date: Option<NaiveDate>,
}

/// The slice of a created episode the uploader consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadEpisode {
    pub id: u32,
}

impl CreateSeries {
    /// Maps a crawled subject to a series creation request.
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            name: subject.name.clone(),
            name_cn: subject.name_cn.clone(),
            description: subject.summary.clone(),
            air_date: subject.air_date,
            bangumi_id: subject.id,
        }
    }
}

/// Maps a subject's episodes to bulk creation requests against the given
/// series id. An episode carries the subject's air date, and only when the
/// episode has a date of its own.
pub fn episodes_for(subject: &Subject, series_id: u32) -> Vec<CreateEpisode> {
    subject
        .eps
        .iter()
        .map(|episode| CreateEpisode {
            name: episode.name.clone(),
            name_cn: episode.name_cn.clone(),
            sort: episode.sort,
            kind: episode.kind,
            series: series_id,
            air_date: episode.air_date.and(subject.air_date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Episode, SubjectType};

    fn subject_with_episodes() -> Subject {
        Subject {
            id: 253,
            kind: SubjectType::Anime,
            name: "カウボーイビバップ".to_string(),
            name_cn: Some("星际牛仔".to_string()),
            summary: Some("2071年、太陽系。".to_string()),
            air_date: NaiveDate::from_ymd_opt(1998, 4, 3),
            eps: vec![
                Episode {
                    id: 519,
                    kind: EpisodeType::Main,
                    name: "Asteroid Blues".to_string(),
                    name_cn: None,
                    sort: 1.0,
                    air_date: NaiveDate::from_ymd_opt(1998, 10, 24),
                },
                Episode {
                    id: 520,
                    kind: EpisodeType::Special,
                    name: "Session XX".to_string(),
                    name_cn: None,
                    sort: 22.5,
                    air_date: None,
                },
            ],
        }
    }

    #[test]
    fn test_series_mapping() {
        let subject = subject_with_episodes();
        let series = CreateSeries::from_subject(&subject);
        assert_eq!(series.name, subject.name);
        assert_eq!(series.name_cn, subject.name_cn);
        assert_eq!(series.description, subject.summary);
        assert_eq!(series.air_date, subject.air_date);
        assert_eq!(series.bangumi_id, 253);
    }

    #[test]
    fn test_episode_mapping_uses_series_id() {
        let subject = subject_with_episodes();
        let episodes = episodes_for(&subject, 77);
        assert_eq!(episodes.len(), 2);
        assert!(episodes.iter().all(|e| e.series == 77));
        assert_eq!(episodes[0].sort, 1.0);
        assert_eq!(episodes[1].kind, EpisodeType::Special);
    }

    #[test]
    fn test_episode_air_date_is_gated_on_own_date() {
        let subject = subject_with_episodes();
        let episodes = episodes_for(&subject, 1);
        // First episode has its own date, so the subject's date is used.
        assert_eq!(episodes[0].air_date, subject.air_date);
        // Second has none, so none is sent.
        assert!(episodes[1].air_date.is_none());
    }

    #[test]
    fn test_episode_serializes_type_as_integer() {
        let subject = subject_with_episodes();
        let episodes = episodes_for(&subject, 1);
        let json = serde_json::to_value(&episodes[1]).unwrap();
        assert_eq!(json["type"], 1);
    }
}
