use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Opaque, store-generated key of a record. Relationships between records (a book's author, an
/// issue's book) always point at this key, never at the sequential `id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct RecordRef(String);

impl RecordRef {
    #[must_use]
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordRef {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordRef {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for RecordRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AuthorRecord {
    #[serde(rename = "ref")]
    pub record_ref: RecordRef,
    /// Sequential id, `None` only for legacy rows that have not been backfilled yet
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BookRecord {
    #[serde(rename = "ref")]
    pub record_ref: RecordRef,
    pub id: Option<i64>,
    pub title: String,
    pub isbn: Option<String>,
    /// Opaque reference of the author
    pub author_id: RecordRef,
    pub publication_year: Option<i64>,
    pub genre: Option<String>,
    pub total_copies: i64,
    pub available_copies: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A book joined with the name of its author, if the author still exists.
#[non_exhaustive]
#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BookView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub book: BookRecord,
    pub author_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum IssueStatus {
    Issued,
    Returned,
    Overdue,
}

impl IssueStatus {
    #[must_use]
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Returned => "returned",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for IssueStatus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[non_exhaustive]
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IssueRecord {
    #[serde(rename = "ref")]
    pub record_ref: RecordRef,
    pub id: Option<i64>,
    /// Opaque reference of the borrowed book
    pub book_id: RecordRef,
    pub member_name: String,
    pub member_email: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Set if and only if `status` is `Returned`
    pub return_date: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An issue joined with the title of its book and the name of the book's author.
#[non_exhaustive]
#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IssueView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub issue: IssueRecord,
    pub book_title: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
}

/// Partial author update, absent fields stay untouched.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuthorPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub isbn: Option<String>,
    pub author_id: RecordRef,
    pub publication_year: Option<i64>,
    pub genre: Option<String>,
    /// Defaults to 1
    pub total_copies: Option<i64>,
    /// Defaults to `total_copies`
    pub available_copies: Option<i64>,
}

/// Partial book update, absent fields stay untouched.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub author_id: Option<RecordRef>,
    pub publication_year: Option<i64>,
    pub genre: Option<String>,
    pub total_copies: Option<i64>,
    pub available_copies: Option<i64>,
}

/// The borrowing member of an issue.
#[derive(Deserialize, Debug, Clone)]
pub struct MemberInfo {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewIssue {
    pub book_id: RecordRef,
    pub member_name: String,
    pub member_email: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_datetime")]
    pub due_date: DateTime<Utc>,
}

impl NewIssue {
    #[must_use]
    #[inline]
    pub fn member(&self) -> MemberInfo {
        MemberInfo {
            name: self.member_name.clone(),
            email: self.member_email.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct StatusChange {
    pub status: IssueStatus,
}

/// Parses either a full RFC 3339 timestamp or a plain `YYYY-MM-DD` date, the latter taken as
/// midnight UTC.
/// # Errors
/// Returns a message naming the input if neither format matches.
#[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
pub fn parse_lenient_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.to_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_err| format!("invalid date `{raw}`, expected YYYY-MM-DD or RFC 3339"))
}

fn deserialize_lenient_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lenient_datetime(&raw).map_err(serde::de::Error::custom)
}

/// Trims optional free-text input and treats blank strings as absent.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lenient_datetime_accepts_plain_dates() {
        let parsed = parse_lenient_datetime("2025-03-14").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-14T00:00:00+00:00");
    }

    #[test]
    fn lenient_datetime_accepts_rfc3339_with_offset() {
        let parsed = parse_lenient_datetime("2025-03-14T12:30:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-14T10:30:00+00:00");
    }

    #[test]
    fn lenient_datetime_rejects_garbage() {
        assert!(parse_lenient_datetime("next tuesday").is_err());
    }

    #[test]
    fn new_issue_deserializes_form_dates() {
        let issue: NewIssue = serde_json::from_str(
            r#"{"book_id": "abc", "member_name": "Ada", "due_date": "2030-01-02"}"#,
        )
        .unwrap();
        assert_eq!(issue.book_id, RecordRef::from("abc"));
        assert_eq!(issue.member_email, None);
        assert_eq!(issue.due_date.to_rfc3339(), "2030-01-02T00:00:00+00:00");
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        assert_eq!(normalize_optional(Some(String::from("   "))), None);
        assert_eq!(
            normalize_optional(Some(String::from(" 978-0 "))),
            Some(String::from("978-0"))
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&IssueStatus::Overdue).unwrap(),
            "\"overdue\""
        );
    }
}
