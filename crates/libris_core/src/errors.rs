//! Error types shared by every operation of the core library.

/// The error type returned by the allocator, the reconciler, the inventory and the services.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Kind of the missing entity, e.g. `"Book"`
        entity: &'static str,
        /// The sequential id or opaque reference that was looked up
        key: String,
    },
    /// No copies of the requested book are left to issue, or the book does not exist.
    #[error("Book not available")]
    NotAvailable,
    /// A unique field such as the ISBN is already taken, or the request contradicts the
    /// current state of the record.
    #[error("{0}")]
    Conflict(String),
    /// The request is malformed or would break a record invariant.
    #[error("{0}")]
    Validation(String),
    /// The underlying store failed or is unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(sqlx::Error),
    /// The embedded schema migrations could not be applied.
    #[error("failed to migrate database: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Convenience alias used across the crate.
pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

#[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
impl From<sqlx::Error> for LibraryError {
    fn from(error: sqlx::Error) -> Self {
        if is_sqlite_unique_violation(&error) {
            return Self::Conflict(constraint_message(&error));
        }
        if is_sqlite_check_violation(&error) {
            return Self::Validation(constraint_message(&error));
        }
        Self::StoreUnavailable(error)
    }
}

#[allow(
    clippy::pattern_type_mismatch,
    reason = "False positive, this is the idiomatic pattern"
)]
fn is_sqlite_unique_violation(error: &sqlx::Error) -> bool {
    // Check for unique violation by searching for matching text in error message
    if let sqlx::Error::Database(db_err) = error {
        db_err.message().contains("UNIQUE constraint failed")
    } else {
        false
    }
}

#[allow(
    clippy::pattern_type_mismatch,
    reason = "False positive, this is the idiomatic pattern"
)]
fn is_sqlite_check_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = error {
        db_err.message().contains("CHECK constraint failed")
    } else {
        false
    }
}

#[allow(
    clippy::pattern_type_mismatch,
    reason = "False positive, this is the idiomatic pattern"
)]
fn constraint_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("books.isbn") {
                String::from("A book with this ISBN already exists")
            } else if message.contains("UNIQUE") {
                format!("Duplicate value: {message}")
            } else {
                format!("Record invariant violated: {message}")
            }
        }
        other => other.to_string(),
    }
}
