use crate::database::begin_write;
use crate::database::types::{IssueRecord, IssueStatus, IssueView, NewIssue};
use crate::errors::{LibraryError, LibraryResult};
use crate::inventory::Inventory;
use crate::sorting::{ISSUE_SORT, SortRequest};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

const ISSUE_VIEW: &str = "SELECT i.*, b.title AS book_title, a.name AS author_name
    FROM issues AS i
    LEFT JOIN books AS b ON b.record_ref = i.book_id
    LEFT JOIN authors AS a ON a.record_ref = b.author_id";

#[derive(Debug, Clone)]
pub struct IssueService {
    pool: SqlitePool,
    inventory: Inventory,
}

impl IssueService {
    #[must_use]
    #[inline]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inventory: Inventory::new(pool.clone()),
            pool,
        }
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called when table updates")]
    pub async fn list(&self, sort: &SortRequest) -> LibraryResult<Vec<IssueView>> {
        let sql = format!("{ISSUE_VIEW} {}", ISSUE_SORT.order_by(sort));
        let issues: Vec<IssueView> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(issues)
    }

    /// Issues that are still out, soonest due first.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called when table updates")]
    pub async fn active(&self) -> LibraryResult<Vec<IssueView>> {
        let sql =
            format!("{ISSUE_VIEW} WHERE i.status IN ('issued', 'overdue') ORDER BY i.due_date ASC");
        let issues: Vec<IssueView> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(issues)
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn get(&self, id: i64) -> LibraryResult<IssueView> {
        let sql = format!("{ISSUE_VIEW} WHERE i.id = ?1");
        let issue: Option<IssueView> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        issue.ok_or_else(|| LibraryError::not_found("Issue", id))
    }

    /// Lends a book, see [`Inventory::issue`].
    /// # Errors
    /// Same as [`Inventory::issue`].
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn issue(&self, new: NewIssue) -> LibraryResult<IssueRecord> {
        self.inventory
            .issue(&new.book_id, new.member(), new.due_date)
            .await
    }

    /// Takes a book back, see [`Inventory::return_book`].
    /// # Errors
    /// Same as [`Inventory::return_book`].
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn return_issue(&self, id: i64) -> LibraryResult<IssueRecord> {
        self.inventory.return_book(id).await
    }

    /// Changes the status of an issue. Moving to `returned` runs the full return so the copy goes
    /// back on the shelf, a returned issue cannot be reopened.
    /// # Errors
    /// `NotFound` if the issue does not exist, `Conflict` if it was already returned.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "issues.update_status", skip(self))]
    pub async fn update_status(&self, id: i64, status: IssueStatus) -> LibraryResult<IssueRecord> {
        if status == IssueStatus::Returned {
            return self.inventory.return_book(id).await;
        }

        let mut tx = begin_write(&self.pool).await?;
        let Some(mut issue) = find_issue(&mut tx, id).await? else {
            return Err(LibraryError::not_found("Issue", id));
        };
        if issue.status == IssueStatus::Returned {
            return Err(LibraryError::Conflict(format!(
                "Issue {id} has already been returned and cannot become {status}"
            )));
        }

        issue.status = status;
        issue.updated_at = Utc::now();
        sqlx::query("UPDATE issues SET status = ?1, updated_at = ?2 WHERE record_ref = ?3")
            .bind(issue.status)
            .bind(issue.updated_at)
            .bind(&issue.record_ref)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(issue)
    }

    /// Deletes the issue record. An outstanding copy is not given back to its book.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "issues.delete", skip(self))]
    pub async fn delete(&self, id: i64) -> LibraryResult<()> {
        let deleted = sqlx::query("DELETE FROM issues WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(LibraryError::not_found("Issue", id));
        }
        Ok(())
    }
}

pub(crate) async fn find_issue(
    conn: &mut SqliteConnection,
    id: i64,
) -> LibraryResult<Option<IssueRecord>> {
    let issue: Option<IssueRecord> = sqlx::query_as("SELECT * FROM issues WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(issue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Db;
    use crate::database::testing::file_db;
    use crate::database::types::{NewAuthor, NewBook, RecordRef};
    use crate::services::Library;
    use chrono::{DateTime, Duration};
    use futures::future::join_all;
    use pretty_assertions::assert_eq;

    async fn library() -> (Library, RecordRef) {
        stocked(Db::in_memory().await.unwrap(), 2).await
    }

    async fn stocked(db: Db, copies: i64) -> (Library, RecordRef) {
        let (library, _reports) = Library::start(db.pool().clone()).await.unwrap();
        let author = library
            .authors
            .create(NewAuthor {
                name: String::from("Mary Shelley"),
                ..NewAuthor::default()
            })
            .await
            .unwrap();
        let book = library
            .books
            .create(NewBook {
                title: String::from("Frankenstein"),
                isbn: None,
                author_id: author.record_ref,
                publication_year: Some(1818),
                genre: Some(String::from("Gothic")),
                total_copies: Some(copies),
                available_copies: None,
            })
            .await
            .unwrap();
        (library, book.record_ref)
    }

    fn new_issue(book_ref: &RecordRef, member: &str, due_in_days: i64) -> NewIssue {
        NewIssue {
            book_id: book_ref.clone(),
            member_name: member.to_owned(),
            member_email: None,
            due_date: due(due_in_days),
        }
    }

    fn due(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    #[tokio::test]
    async fn view_joins_book_and_author() {
        let (library, book_ref) = library().await;
        let issue = library
            .issues
            .issue(new_issue(&book_ref, "Victor", 7))
            .await
            .unwrap();

        let view = library.issues.get(issue.id.unwrap()).await.unwrap();

        assert_eq!(view.book_title.as_deref(), Some("Frankenstein"));
        assert_eq!(view.author_name.as_deref(), Some("Mary Shelley"));
        assert_eq!(view.issue, issue);
    }

    #[tokio::test]
    async fn active_excludes_returned_and_orders_by_due_date() {
        let (library, book_ref) = library().await;
        let late = library
            .issues
            .issue(new_issue(&book_ref, "Elizabeth", 21))
            .await
            .unwrap();
        let soon = library
            .issues
            .issue(new_issue(&book_ref, "Henry", 3))
            .await
            .unwrap();

        let before: Vec<Option<i64>> = library
            .issues
            .active()
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.issue.id)
            .collect();
        library.issues.return_issue(soon.id.unwrap()).await.unwrap();
        let after: Vec<Option<i64>> = library
            .issues
            .active()
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.issue.id)
            .collect();

        assert_eq!(before, vec![soon.id, late.id]);
        assert_eq!(after, vec![late.id]);
    }

    #[tokio::test]
    async fn list_defaults_to_newest_first() {
        let (library, book_ref) = library().await;
        let first = library
            .issues
            .issue(new_issue(&book_ref, "Justine", 5))
            .await
            .unwrap();
        let second = library
            .issues
            .issue(new_issue(&book_ref, "William", 5))
            .await
            .unwrap();

        let ids: Vec<Option<i64>> = library
            .issues
            .list(&SortRequest::default())
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.issue.id)
            .collect();
        let by_member: Vec<String> = library
            .issues
            .list(&SortRequest::new("member_name", "asc"))
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.issue.member_name)
            .collect();

        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(by_member, vec!["Justine", "William"]);
    }

    #[tokio::test]
    async fn status_can_be_marked_overdue() {
        let (library, book_ref) = library().await;
        let issue = library
            .issues
            .issue(new_issue(&book_ref, "Robert", 1))
            .await
            .unwrap();

        let overdue = library
            .issues
            .update_status(issue.id.unwrap(), IssueStatus::Overdue)
            .await
            .unwrap();

        assert_eq!(overdue.status, IssueStatus::Overdue);
        assert_eq!(overdue.return_date, None);
        assert_eq!(library.books.get(1).await.unwrap().book.available_copies, 1);
    }

    #[tokio::test]
    async fn status_returned_runs_the_return() {
        let (library, book_ref) = library().await;
        let issue = library
            .issues
            .issue(new_issue(&book_ref, "Robert", 1))
            .await
            .unwrap();
        let id = issue.id.unwrap();

        let returned = library
            .issues
            .update_status(id, IssueStatus::Returned)
            .await
            .unwrap();
        let reopened = library.issues.update_status(id, IssueStatus::Issued).await;

        assert_eq!(returned.status, IssueStatus::Returned);
        assert!(returned.return_date.is_some());
        assert_eq!(library.books.get(1).await.unwrap().book.available_copies, 2);
        assert!(matches!(reopened, Err(LibraryError::Conflict(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_status_changes_on_a_file_database_all_apply() {
        let (db, _dir) = file_db().await;
        let (library, book_ref) = stocked(db, 10).await;
        let mut ids = Vec::new();
        for member in 0..10 {
            let issue = library
                .issues
                .issue(new_issue(&book_ref, &format!("member {member}"), 7))
                .await
                .unwrap();
            ids.push(issue.id.unwrap());
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let issues = library.issues.clone();
                let status = if id % 2 == 0 {
                    IssueStatus::Returned
                } else {
                    IssueStatus::Overdue
                };
                tokio::spawn(async move { issues.update_status(id, status).await })
            })
            .collect();
        let failures: Vec<String> = join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| joined.unwrap().err())
            .map(|error| error.to_string())
            .collect();
        let statuses: Vec<IssueStatus> = library
            .issues
            .active()
            .await
            .unwrap()
            .into_iter()
            .map(|view| view.issue.status)
            .collect();

        assert_eq!(failures, Vec::<String>::new());
        assert_eq!(statuses, vec![IssueStatus::Overdue; 5]);
        assert_eq!(library.books.get(1).await.unwrap().book.available_copies, 5);
    }

    #[tokio::test]
    async fn delete_keeps_book_counts_untouched() {
        let (library, book_ref) = library().await;
        let issue = library
            .issues
            .issue(new_issue(&book_ref, "Walton", 2))
            .await
            .unwrap();

        library.issues.delete(issue.id.unwrap()).await.unwrap();

        assert_eq!(library.books.get(1).await.unwrap().book.available_copies, 1);
        assert!(matches!(
            library.issues.get(issue.id.unwrap()).await,
            Err(LibraryError::NotFound { entity: "Issue", .. })
        ));
    }
}
