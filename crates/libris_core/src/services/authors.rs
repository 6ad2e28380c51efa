use crate::database::begin_write;
use crate::database::types::{
    AuthorPatch, AuthorRecord, NewAuthor, RecordRef, normalize_optional,
};
use crate::errors::{LibraryError, LibraryResult};
use crate::sequence::{self, SequenceAllocator};
use crate::services::required;
use crate::sorting::{AUTHOR_SORT, SortRequest};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct AuthorService {
    pool: SqlitePool,
}

impl AuthorService {
    #[must_use]
    #[inline]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called when table updates")]
    pub async fn list(&self, sort: &SortRequest) -> LibraryResult<Vec<AuthorRecord>> {
        let sql = format!("SELECT a.* FROM authors AS a {}", AUTHOR_SORT.order_by(sort));
        let authors: Vec<AuthorRecord> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(authors)
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn get(&self, id: i64) -> LibraryResult<AuthorRecord> {
        let mut conn = self.pool.acquire().await?;
        find_author(&mut conn, id)
            .await?
            .ok_or_else(|| LibraryError::not_found("Author", id))
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "authors.create", skip_all)]
    pub async fn create(&self, new: NewAuthor) -> LibraryResult<AuthorRecord> {
        let name = required("name", &new.name)?;
        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;

        let id = SequenceAllocator::next_in(&mut tx, sequence::AUTHORS).await?;
        let author = AuthorRecord {
            record_ref: RecordRef::generate(),
            id: Some(id),
            name,
            email: normalize_optional(new.email),
            bio: normalize_optional(new.bio),
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO authors (record_ref, id, name, email, bio, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?);
        "#,
        )
        .bind(&author.record_ref)
        .bind(author.id)
        .bind(&author.name)
        .bind(&author.email)
        .bind(&author.bio)
        .bind(author.created_at)
        .bind(author.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(id, "author created");
        Ok(author)
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "authors.update", skip(self, patch))]
    pub async fn update(&self, id: i64, patch: AuthorPatch) -> LibraryResult<AuthorRecord> {
        let mut tx = begin_write(&self.pool).await?;
        let Some(mut author) = find_author(&mut tx, id).await? else {
            return Err(LibraryError::not_found("Author", id));
        };

        if let Some(name) = patch.name {
            author.name = required("name", &name)?;
        }
        if patch.email.is_some() {
            author.email = normalize_optional(patch.email);
        }
        if patch.bio.is_some() {
            author.bio = normalize_optional(patch.bio);
        }
        author.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE authors
            SET name = ?1, email = ?2, bio = ?3, updated_at = ?4
            WHERE record_ref = ?5;
        "#,
        )
        .bind(&author.name)
        .bind(&author.email)
        .bind(&author.bio)
        .bind(author.updated_at)
        .bind(&author.record_ref)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(author)
    }

    /// Deletes the author. Their books are kept and keep pointing at the removed reference.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "authors.delete", skip(self))]
    pub async fn delete(&self, id: i64) -> LibraryResult<()> {
        let deleted = sqlx::query("DELETE FROM authors WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(LibraryError::not_found("Author", id));
        }
        Ok(())
    }
}

async fn find_author(conn: &mut SqliteConnection, id: i64) -> LibraryResult<Option<AuthorRecord>> {
    let author: Option<AuthorRecord> = sqlx::query_as("SELECT * FROM authors WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(author)
}

pub(crate) async fn author_exists(
    conn: &mut SqliteConnection,
    record_ref: &RecordRef,
) -> LibraryResult<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM authors WHERE record_ref = ?1)")
            .bind(record_ref)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}
