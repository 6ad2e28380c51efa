//! Lending inventory
//!
//! Keeps every book's `available_copies` in step with its outstanding issues. Issuing a book
//! takes a copy, returning it gives the copy back. Each operation touches both the book and the
//! issue inside one transaction, a failure on either side leaves both untouched.
use crate::database::begin_write;
use crate::database::types::{
    IssueRecord, IssueStatus, MemberInfo, RecordRef, normalize_optional,
};
use crate::errors::{LibraryError, LibraryResult};
use crate::sequence::{self, SequenceAllocator};
use crate::services::issues::find_issue;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Inventory {
    pool: SqlitePool,
}

impl Inventory {
    #[must_use]
    #[inline]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lends one copy of the book identified by `book_ref` to `member` until `due_date`.
    /// # Errors
    /// `NotAvailable` if the book does not exist or has no copy left, `Validation` if the member
    /// name is blank or the due date lies before today.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "inventory.issue", skip(self, member), fields(book_ref = %book_ref))]
    pub async fn issue(
        &self,
        book_ref: &RecordRef,
        member: MemberInfo,
        due_date: DateTime<Utc>,
    ) -> LibraryResult<IssueRecord> {
        let member_name = member.name.trim().to_owned();
        if member_name.is_empty() {
            return Err(LibraryError::Validation(String::from(
                "member_name is required",
            )));
        }
        let now = Utc::now();
        if due_date.date_naive() < now.date_naive() {
            return Err(LibraryError::Validation(String::from(
                "due_date must not lie in the past",
            )));
        }

        let mut tx = begin_write(&self.pool).await?;

        // Conditional decrement: the availability check and the write are one statement, two
        // concurrent issues of the last copy cannot both succeed
        let taken = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = ?1
            WHERE record_ref = ?2 AND available_copies > 0;
        "#,
        )
        .bind(now)
        .bind(book_ref)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if taken == 0 {
            tracing::info!("book not available");
            return Err(LibraryError::NotAvailable);
        }

        let id = SequenceAllocator::next_in(&mut tx, sequence::ISSUES).await?;
        let issue = IssueRecord {
            record_ref: RecordRef::generate(),
            id: Some(id),
            book_id: book_ref.clone(),
            member_name,
            member_email: normalize_optional(member.email),
            issue_date: now,
            due_date,
            return_date: None,
            status: IssueStatus::Issued,
            created_at: now,
            updated_at: now,
        };
        insert_issue(&mut tx, &issue).await?;
        tx.commit().await?;

        tracing::info!(id, "book issued");
        Ok(issue)
    }

    /// Marks the issue with sequential id `issue_id` as returned and gives its copy back to the
    /// book. The copy count never exceeds the book's total. If the book has been deleted in the
    /// meantime the issue is still closed.
    /// # Errors
    /// `NotFound` if no such issue exists, `Conflict` if it was already returned.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "inventory.return_book", skip(self))]
    pub async fn return_book(&self, issue_id: i64) -> LibraryResult<IssueRecord> {
        let mut tx = begin_write(&self.pool).await?;

        let Some(mut issue) = find_issue(&mut tx, issue_id).await? else {
            return Err(LibraryError::not_found("Issue", issue_id));
        };
        if issue.status == IssueStatus::Returned {
            return Err(LibraryError::Conflict(format!(
                "Issue {issue_id} has already been returned"
            )));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE issues
            SET status = ?1, return_date = ?2, updated_at = ?2
            WHERE record_ref = ?3;
        "#,
        )
        .bind(IssueStatus::Returned)
        .bind(now)
        .bind(&issue.record_ref)
        .execute(&mut *tx)
        .await?;

        let restored = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = MIN(total_copies, available_copies + 1), updated_at = ?1
            WHERE record_ref = ?2;
        "#,
        )
        .bind(now)
        .bind(&issue.book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if restored == 0 {
            tracing::warn!(book_ref = %issue.book_id, "returned issue references a deleted book");
        }
        tx.commit().await?;

        issue.status = IssueStatus::Returned;
        issue.return_date = Some(now);
        issue.updated_at = now;
        tracing::info!(id = issue_id, "book returned");
        Ok(issue)
    }
}

async fn insert_issue(conn: &mut SqliteConnection, issue: &IssueRecord) -> LibraryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO issues (
            record_ref,
            id,
            book_id,
            member_name,
            member_email,
            issue_date,
            due_date,
            return_date,
            status,
            created_at,
            updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
    "#,
    )
    .bind(&issue.record_ref)
    .bind(issue.id)
    .bind(&issue.book_id)
    .bind(&issue.member_name)
    .bind(&issue.member_email)
    .bind(issue.issue_date)
    .bind(issue.due_date)
    .bind(issue.return_date)
    .bind(issue.status)
    .bind(issue.created_at)
    .bind(issue.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
