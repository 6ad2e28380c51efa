//! Sort order for list queries.
//!
//! Clients name the field to sort by, the field is resolved against a fixed whitelist of columns
//! per entity so that no client text ever ends up inside an SQL statement.
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Resolves a client supplied direction, anything other than `asc` or `desc` falls back to
    /// `default`.
    #[must_use]
    #[inline]
    pub fn parse_or(raw: Option<&str>, default: Self) -> Self {
        match raw.map(str::trim) {
            Some(dir) if dir.eq_ignore_ascii_case("asc") => Self::Asc,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => Self::Desc,
            _ => default,
        }
    }

    const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The sort parameters of a list request, as sent by the web frontend.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SortRequest {
    #[serde(rename = "sortField")]
    pub field: Option<String>,
    #[serde(rename = "sortDir")]
    pub direction: Option<String>,
}

impl SortRequest {
    #[must_use]
    #[inline]
    pub fn new(field: &str, direction: &str) -> Self {
        Self {
            field: Some(field.to_owned()),
            direction: Some(direction.to_owned()),
        }
    }
}

/// Whitelisted sort columns of one entity listing.
pub(crate) struct SortSpec {
    /// Pairs of (client field name, qualified SQL column)
    columns: &'static [(&'static str, &'static str)],
    default_field: &'static str,
    default_direction: SortDirection,
    /// Secondary ordering appended to every clause
    tiebreak: &'static str,
}

impl SortSpec {
    pub(crate) fn order_by(&self, request: &SortRequest) -> String {
        let column = self
            .column(request.field.as_deref())
            .or_else(|| self.column(Some(self.default_field)))
            .unwrap_or(self.tiebreak);
        let direction =
            SortDirection::parse_or(request.direction.as_deref(), self.default_direction);

        format!(
            "ORDER BY {column} {}, {}",
            direction.keyword(),
            self.tiebreak
        )
    }

    fn column(&self, field: Option<&str>) -> Option<&'static str> {
        let field = field?.trim();
        self.columns
            .iter()
            .find(|&&(name, _)| name == field)
            .map(|&(_, column)| column)
    }
}

pub(crate) const AUTHOR_SORT: SortSpec = SortSpec {
    columns: &[
        ("id", "a.id"),
        ("name", "a.name"),
        ("email", "a.email"),
        ("createdAt", "a.created_at"),
        ("created_at", "a.created_at"),
        ("updatedAt", "a.updated_at"),
        ("updated_at", "a.updated_at"),
    ],
    default_field: "name",
    default_direction: SortDirection::Asc,
    tiebreak: "a.name ASC",
};

pub(crate) const BOOK_SORT: SortSpec = SortSpec {
    columns: &[
        ("id", "b.id"),
        ("title", "b.title"),
        ("isbn", "b.isbn"),
        ("author_name", "author_name"),
        ("publication_year", "b.publication_year"),
        ("genre", "b.genre"),
        ("total_copies", "b.total_copies"),
        ("available_copies", "b.available_copies"),
        ("created_at", "b.created_at"),
    ],
    default_field: "title",
    default_direction: SortDirection::Asc,
    tiebreak: "b.title ASC",
};

pub(crate) const ISSUE_SORT: SortSpec = SortSpec {
    columns: &[
        ("id", "i.id"),
        ("book_title", "book_title"),
        ("author_name", "author_name"),
        ("member_name", "i.member_name"),
        ("member_email", "i.member_email"),
        ("issue_date", "i.issue_date"),
        ("due_date", "i.due_date"),
        ("return_date", "i.return_date"),
        ("status", "i.status"),
    ],
    default_field: "issue_date",
    default_direction: SortDirection::Desc,
    tiebreak: "i.issue_date DESC",
};
