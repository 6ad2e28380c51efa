use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use libris_core::LibraryError;
use serde_json::json;

/// Error type of the HTTP handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Error variant arising from the core library
    #[error(transparent)]
    Library(#[from] LibraryError),
    /// The request body or path could not be parsed
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Library(LibraryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Library(LibraryError::NotAvailable | LibraryError::Validation(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Library(LibraryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Library(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!(%status, "request rejected: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (
                ApiError::from(LibraryError::NotFound {
                    entity: "Book",
                    key: String::from("3"),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(LibraryError::NotAvailable),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(LibraryError::Conflict(String::from("isbn taken"))),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(LibraryError::Validation(String::from("title is required"))),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(LibraryError::StoreUnavailable(sqlx_pool_closed())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        let statuses: Vec<StatusCode> = cases.iter().map(|(error, _)| error.status()).collect();
        let expected: Vec<StatusCode> = cases.iter().map(|&(_, status)| status).collect();

        assert_eq!(statuses, expected);
    }

    #[test]
    fn messages_are_human_readable() {
        let not_found = ApiError::from(LibraryError::NotFound {
            entity: "Author",
            key: String::from("12"),
        });
        assert_eq!(not_found.to_string(), "Author not found");
        assert_eq!(
            ApiError::from(LibraryError::NotAvailable).to_string(),
            "Book not available"
        );
    }

    fn sqlx_pool_closed() -> libris_core::database::StoreError {
        libris_core::database::StoreError::PoolClosed
    }
}
