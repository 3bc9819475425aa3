//! Announcement domain types and their JSON wire shape
//!
//! The backend speaks Portuguese field names (`titulo`, `conteudo`,
//! `dataPublicacao`, ...). Serde renames keep the Rust side in English.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::announcements::error::{AnnouncementError, AnnouncementResult};

/// Which slice of the service's announcements a viewer sees
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Everything published for the student's course
    Student,
    /// Everything authored by one professor, keyed by email
    Professor(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Student => write!(f, "student feed"),
            Scope::Professor(email) => write!(f, "professor {}", email),
        }
    }
}

/// An announcement as confirmed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(alias = "_id", deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "dataPublicacao", deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "professorEmail")]
    pub author_email: String,
    #[serde(rename = "professorNome", default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

/// A new announcement as typed by a professor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnouncementDraft {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub body: String,
    #[serde(rename = "professorNome")]
    pub author_name: String,
    #[serde(rename = "professorEmail")]
    pub author_email: String,
}

impl AnnouncementDraft {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Check the draft before it is sent anywhere
    pub fn validate(&self) -> AnnouncementResult<()> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)?;
        require_text("author email", &self.author_email)
    }
}

/// Replacement title and body for an existing announcement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnouncementPatch {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub body: String,
}

impl AnnouncementPatch {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn validate(&self) -> AnnouncementResult<()> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)
    }
}

/// Course header shown above the student feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    #[serde(rename = "materia")]
    pub subject: String,
    #[serde(rename = "periodo")]
    pub term: String,
}

fn require_text(field: &str, value: &str) -> AnnouncementResult<()> {
    if value.trim().is_empty() {
        return Err(AnnouncementError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Parse the timestamp forms the backend has been seen to emit.
///
/// Naive timestamps carry no offset and are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Ids arrive as strings from some deployments and integers from others
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("unsupported id: {}", other))),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("unrecognised timestamp: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_announcement_from_wire() {
        let json = r#"{
            "id": 12,
            "titulo": "Prova",
            "conteudo": "Prova de recuperação disponível",
            "dataPublicacao": "2025-11-10T15:20:00",
            "professorEmail": "claudio@fucapi.br",
            "professorNome": "Professor Claudio"
        }"#;

        let announcement: Announcement = serde_json::from_str(json).unwrap();
        assert_eq!(announcement.id, "12");
        assert_eq!(announcement.title, "Prova");
        assert_eq!(
            announcement.published_at,
            Utc.with_ymd_and_hms(2025, 11, 10, 15, 20, 0).unwrap()
        );
        assert_eq!(announcement.author_name.as_deref(), Some("Professor Claudio"));
    }

    #[test]
    fn test_mongo_style_id_and_missing_name() {
        let json = r#"{
            "_id": "6571a0",
            "titulo": "Aviso",
            "conteudo": "Material atualizado",
            "dataPublicacao": "Sun, 09 Nov 2025 12:10:00 GMT",
            "professorEmail": "claudio@fucapi.br"
        }"#;

        let announcement: Announcement = serde_json::from_str(json).unwrap();
        assert_eq!(announcement.id, "6571a0");
        assert!(announcement.author_name.is_none());
        assert_eq!(
            announcement.published_at,
            Utc.with_ymd_and_hms(2025, 11, 9, 12, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 11, 9, 40, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-11T09:40:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-11T05:40:00-04:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-11 09:40:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-11T09:40:00.000"), Some(expected));
        assert_eq!(parse_timestamp("11 de Nov - 09:40"), None);
    }

    #[test]
    fn test_draft_validation() {
        let ok = AnnouncementDraft::new("Aula", "Sem aula amanhã", "Claudio", "c@x.br");
        assert!(ok.validate().is_ok());

        let blank_title = AnnouncementDraft::new("   ", "x", "Claudio", "c@x.br");
        assert!(matches!(
            blank_title.validate(),
            Err(AnnouncementError::Validation { ref field, .. }) if field == "title"
        ));

        let blank_body = AnnouncementPatch::new("A", "\n\t");
        assert!(blank_body.validate().is_err());
    }

    #[test]
    fn test_draft_wire_shape() {
        let draft = AnnouncementDraft::new("Aula", "Texto", "Claudio", "c@x.br");
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["titulo"], "Aula");
        assert_eq!(value["conteudo"], "Texto");
        assert_eq!(value["professorNome"], "Claudio");
        assert_eq!(value["professorEmail"], "c@x.br");
    }
}
