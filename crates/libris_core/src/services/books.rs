use crate::database::begin_write;
use crate::database::types::{
    BookPatch, BookRecord, BookView, NewBook, RecordRef, normalize_optional,
};
use crate::errors::{LibraryError, LibraryResult};
use crate::sequence::{self, SequenceAllocator};
use crate::services::authors::author_exists;
use crate::services::required;
use crate::sorting::{BOOK_SORT, SortRequest};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

const BOOK_VIEW: &str = "SELECT b.*, a.name AS author_name
    FROM books AS b
    LEFT JOIN authors AS a ON a.record_ref = b.author_id";

#[derive(Debug, Clone)]
pub struct BookService {
    pool: SqlitePool,
}

impl BookService {
    #[must_use]
    #[inline]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called when table updates")]
    pub async fn list(&self, sort: &SortRequest) -> LibraryResult<Vec<BookView>> {
        let sql = format!("{BOOK_VIEW} {}", BOOK_SORT.order_by(sort));
        let books: Vec<BookView> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(books)
    }

    /// Books with at least one copy left to lend, by title.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called when table updates")]
    pub async fn available(&self) -> LibraryResult<Vec<BookView>> {
        let sql = format!("{BOOK_VIEW} WHERE b.available_copies > 0 ORDER BY b.title ASC");
        let books: Vec<BookView> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(books)
    }

    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn get(&self, id: i64) -> LibraryResult<BookView> {
        let sql = format!("{BOOK_VIEW} WHERE b.id = ?1");
        let book: Option<BookView> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        book.ok_or_else(|| LibraryError::not_found("Book", id))
    }

    /// Registers a new book. Copy counts default to one copy, all of them on the shelf.
    /// # Errors
    /// `NotFound` if the author does not exist, `Conflict` if the ISBN is taken, `Validation` if
    /// the title is blank or the copy counts are inconsistent.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "books.create", skip_all, fields(author_ref = %new.author_id))]
    pub async fn create(&self, new: NewBook) -> LibraryResult<BookRecord> {
        let title = required("title", &new.title)?;
        let total_copies = new.total_copies.unwrap_or(1);
        let available_copies = new.available_copies.unwrap_or(total_copies);
        validate_copies(total_copies, available_copies)?;

        let now = Utc::now();
        let mut tx = begin_write(&self.pool).await?;
        if !author_exists(&mut tx, &new.author_id).await? {
            return Err(LibraryError::not_found("Author", &new.author_id));
        }

        let id = SequenceAllocator::next_in(&mut tx, sequence::BOOKS).await?;
        let book = BookRecord {
            record_ref: RecordRef::generate(),
            id: Some(id),
            title,
            isbn: normalize_optional(new.isbn),
            author_id: new.author_id,
            publication_year: new.publication_year,
            genre: normalize_optional(new.genre),
            total_copies,
            available_copies,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO books (
                record_ref,
                id,
                title,
                isbn,
                author_id,
                publication_year,
                genre,
                total_copies,
                available_copies,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
        "#,
        )
        .bind(&book.record_ref)
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.author_id)
        .bind(book.publication_year)
        .bind(&book.genre)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(id, "book created");
        Ok(book)
    }

    /// Applies `patch` to the book. Copy counts are checked against each other after merging,
    /// so lowering `total_copies` below the copies on the shelf is refused.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "books.update", skip(self, patch))]
    pub async fn update(&self, id: i64, patch: BookPatch) -> LibraryResult<BookRecord> {
        let mut tx = begin_write(&self.pool).await?;
        let Some(mut book) = find_book(&mut tx, id).await? else {
            return Err(LibraryError::not_found("Book", id));
        };

        if let Some(title) = patch.title {
            book.title = required("title", &title)?;
        }
        if patch.isbn.is_some() {
            book.isbn = normalize_optional(patch.isbn);
        }
        if let Some(author_id) = patch.author_id {
            if !author_exists(&mut tx, &author_id).await? {
                return Err(LibraryError::not_found("Author", &author_id));
            }
            book.author_id = author_id;
        }
        if patch.publication_year.is_some() {
            book.publication_year = patch.publication_year;
        }
        if patch.genre.is_some() {
            book.genre = normalize_optional(patch.genre);
        }
        book.total_copies = patch.total_copies.unwrap_or(book.total_copies);
        book.available_copies = patch.available_copies.unwrap_or(book.available_copies);
        validate_copies(book.total_copies, book.available_copies)?;
        book.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE books
            SET title = ?1,
                isbn = ?2,
                author_id = ?3,
                publication_year = ?4,
                genre = ?5,
                total_copies = ?6,
                available_copies = ?7,
                updated_at = ?8
            WHERE record_ref = ?9;
        "#,
        )
        .bind(&book.title)
        .bind(&book.isbn)
        .bind(&book.author_id)
        .bind(book.publication_year)
        .bind(&book.genre)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(book.updated_at)
        .bind(&book.record_ref)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(book)
    }

    /// Deletes the book. Issues referencing it are kept, returning them later still succeeds.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "books.delete", skip(self))]
    pub async fn delete(&self, id: i64) -> LibraryResult<()> {
        let deleted = sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(LibraryError::not_found("Book", id));
        }
        Ok(())
    }
}

async fn find_book(conn: &mut SqliteConnection, id: i64) -> LibraryResult<Option<BookRecord>> {
    let book: Option<BookRecord> = sqlx::query_as("SELECT * FROM books WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(book)
}

fn validate_copies(total_copies: i64, available_copies: i64) -> LibraryResult<()> {
    if total_copies < 0 {
        return Err(LibraryError::Validation(String::from(
            "total_copies must not be negative",
        )));
    }
    if !(0..=total_copies).contains(&available_copies) {
        return Err(LibraryError::Validation(format!(
            "available_copies must be between 0 and {total_copies}"
        )));
    }
    Ok(())
}
