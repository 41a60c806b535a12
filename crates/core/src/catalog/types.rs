//! Subject model and tolerant payload validation.
//!
//! The catalog API is loose about its payloads: fields come and go between
//! response groups, dates show up with mixed separators, and localized
//! names are frequently empty strings. Validation therefore accepts
//! anything that carries the minimum identity (`id`, `type`, `name`) and
//! coerces malformed optional fields to absent instead of rejecting the
//! whole record. Unknown fields are ignored.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Discriminant of a catalog subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum SubjectType {
    Book = 1,
    Anime = 2,
    Music = 3,
    Game = 4,
    Real = 6,
}

impl From<SubjectType> for u8 {
    fn from(kind: SubjectType) -> Self {
        kind as u8
    }
}

impl SubjectType {
    /// Maps the wire discriminant to a subject type.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Book),
            2 => Some(Self::Anime),
            3 => Some(Self::Music),
            4 => Some(Self::Game),
            6 => Some(Self::Real),
            _ => None,
        }
    }
}

/// Discriminant of an episode within a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum EpisodeType {
    Main = 0,
    Special = 1,
    Opening = 2,
    Ending = 3,
    Advertising = 4,
    Mad = 5,
    Other = 6,
}

impl From<EpisodeType> for u8 {
    fn from(kind: EpisodeType) -> Self {
        kind as u8
    }
}

impl EpisodeType {
    /// Maps the wire discriminant to an episode type.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Main),
            1 => Some(Self::Special),
            2 => Some(Self::Opening),
            3 => Some(Self::Ending),
            4 => Some(Self::Advertising),
            5 => Some(Self::Mad),
            6 => Some(Self::Other),
            _ => None,
        }
    }
}

/// A validated catalog subject.
///
/// Field order here is the order of the persisted JSON file.
#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: SubjectType,
    pub name: String,
    pub name_cn: Option<String>,
    pub summary: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub eps: Vec<Episode>,
}

/// One episode of a subject. `sort` orders episodes for display; it is not
/// unique and episode ids are not contiguous.
#[derive(Debug, Clone, Serialize)]
pub struct Episode {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: EpisodeType,
    pub name: String,
    pub name_cn: Option<String>,
    pub sort: f64,
    #[serde(rename = "airdate")]
    pub air_date: Option<NaiveDate>,
}

/// One structural problem found while validating a payload.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A payload that does not meet the minimum structural contract.
///
/// Collects every offending field so the log line shows the full picture
/// in one pass.
#[derive(Debug)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// The individual field problems.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid subject payload: ")?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}: {})", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl Subject {
    /// Validates a raw payload into a [`Subject`].
    ///
    /// Missing or malformed `id`, `type` or `name` fail validation, as does
    /// any malformed episode entry; everything else degrades to absent.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Some(obj) = value.as_object() else {
            return Err(ValidationError {
                errors: vec![FieldError {
                    field: "payload".to_string(),
                    message: "not a JSON object".to_string(),
                }],
            });
        };

        let mut errors = Vec::new();

        let id = match obj.get("id").and_then(Value::as_u64) {
            Some(id) if id > 0 && id <= u32::MAX as u64 => Some(id as u32),
            _ => {
                push_error(&mut errors, "id", "missing or not a positive integer");
                None
            }
        };

        let kind = match obj.get("type").and_then(Value::as_u64) {
            Some(code) => match SubjectType::from_code(code) {
                Some(kind) => Some(kind),
                None => {
                    push_error(&mut errors, "type", format!("unknown subject type {}", code));
                    None
                }
            },
            None => {
                push_error(&mut errors, "type", "missing or not an integer");
                None
            }
        };

        let name = match obj.get("name").and_then(Value::as_str) {
            Some(name) => Some(name.to_string()),
            None => {
                push_error(&mut errors, "name", "missing or not a string");
                None
            }
        };

        let name_cn = optional_text(obj, "name_cn");
        let summary = optional_text(obj, "summary");
        let air_date = obj
            .get("air_date")
            .and_then(Value::as_str)
            .and_then(parse_date_lenient);

        let eps = match obj.get("eps") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| parse_episode(item, i, &mut errors))
                .collect(),
            Some(_) => {
                push_error(&mut errors, "eps", "not an array");
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        // The required fields are all Some once `errors` is empty.
        Ok(Subject {
            id: id.unwrap_or_default(),
            kind: kind.unwrap_or(SubjectType::Anime),
            name: name.unwrap_or_default(),
            name_cn,
            summary,
            air_date,
            eps,
        })
    }

    /// The localized name when present, the primary name otherwise.
    pub fn display_name(&self) -> &str {
        self.name_cn.as_deref().unwrap_or(&self.name)
    }

    /// Serializes the subject for persistence: 4-space pretty printing,
    /// declaration-ordered keys, non-ASCII characters left literal.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }
}

fn push_error(errors: &mut Vec<FieldError>, field: impl Into<String>, message: impl Into<String>) {
    errors.push(FieldError {
        field: field.into(),
        message: message.into(),
    });
}

/// Reads an optional text field, coercing missing, non-string and empty
/// values to absent.
fn optional_text(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_episode(value: &Value, index: usize, errors: &mut Vec<FieldError>) -> Option<Episode> {
    let field = |name: &str| format!("eps.{}.{}", index, name);

    let Some(obj) = value.as_object() else {
        push_error(errors, format!("eps.{}", index), "not a JSON object");
        return None;
    };

    let mut ok = true;

    let id = match obj.get("id").and_then(Value::as_u64) {
        Some(id) if id > 0 && id <= u32::MAX as u64 => id as u32,
        _ => {
            push_error(errors, field("id"), "missing or not a positive integer");
            ok = false;
            0
        }
    };

    let kind = match obj.get("type").and_then(Value::as_u64) {
        Some(code) => match EpisodeType::from_code(code) {
            Some(kind) => kind,
            None => {
                push_error(errors, field("type"), format!("unknown episode type {}", code));
                ok = false;
                EpisodeType::Other
            }
        },
        None => {
            push_error(errors, field("type"), "missing or not an integer");
            ok = false;
            EpisodeType::Other
        }
    };

    let name = match obj.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => {
            push_error(errors, field("name"), "missing or not a string");
            ok = false;
            String::new()
        }
    };

    let sort = match obj.get("sort").and_then(Value::as_f64) {
        Some(sort) => sort,
        None => {
            push_error(errors, field("sort"), "missing or not a number");
            ok = false;
            0.0
        }
    };

    let name_cn = optional_text(obj, "name_cn");
    let air_date = obj
        .get("airdate")
        .and_then(Value::as_str)
        .and_then(parse_date_lenient);

    ok.then_some(Episode {
        id,
        kind,
        name,
        name_cn,
        sort,
        air_date,
    })
}

/// Parses a date with two ordered strategies: strict ISO `%Y-%m-%d` first,
/// then a loose scan that takes the first three digit runs as year, month
/// and day regardless of separators (`2008/1/20`, `2008年1月20日`). Returns
/// `None` when both fail or the triplet is not a real date.
pub(crate) fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let mut runs = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty());
    let year: i32 = runs.next()?.parse().ok()?;
    let month: u32 = runs.next()?.parse().ok()?;
    let day: u32 = runs.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
