//! Entity services
//!
//! Thin create/read/update/delete layer over the store. Creation draws ids from the sequence
//! allocator, lending goes through the inventory.
pub mod authors;
pub mod books;
pub mod issues;

use crate::backfill::{ReconcileReport, Reconciler};
use crate::errors::{LibraryError, LibraryResult};
use authors::AuthorService;
use books::BookService;
use issues::IssueService;
use sqlx::SqlitePool;

/// Every service of the library, handed out only once the startup reconciliation has
/// completed so that no id can be allocated before legacy rows are numbered.
#[derive(Debug, Clone)]
pub struct Library {
    pub authors: AuthorService,
    pub books: BookService,
    pub issues: IssueService,
}

impl Library {
    /// Reconciles the ids of every entity table, then builds the services.
    /// # Errors
    /// Propagates any reconciliation failure, startup must abort in that case.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once at startup")]
    pub async fn start(pool: SqlitePool) -> LibraryResult<(Self, Vec<ReconcileReport>)> {
        let reports = Reconciler::new(pool.clone()).reconcile_all().await?;
        let library = Self {
            authors: AuthorService::new(pool.clone()),
            books: BookService::new(pool.clone()),
            issues: IssueService::new(pool),
        };
        Ok((library, reports))
    }
}

/// Trims a required text field, rejecting it if nothing is left.
pub(crate) fn required(field: &str, value: &str) -> LibraryResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}
