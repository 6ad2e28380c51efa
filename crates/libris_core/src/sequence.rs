//! Sequence allocator
//!
//! Hands out the public sequential ids of authors, books and issues. Every named sequence is a
//! single row in the `counters` table holding the last value handed out.
use crate::errors::LibraryResult;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

pub const AUTHORS: &str = "authors";
pub const BOOKS: &str = "books";
pub const ISSUES: &str = "issues";

#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    pool: SqlitePool,
}

impl SequenceAllocator {
    #[must_use]
    #[inline]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the next value of `sequence`, creating the counter at 0 first if it does not
    /// exist yet. The first value of a fresh sequence is therefore 1.
    /// # Errors
    /// Fails only if the store is unavailable.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    #[instrument(name = "sequence.next", skip(self))]
    pub async fn next(&self, sequence: &str) -> LibraryResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::next_in(&mut conn, sequence).await
    }

    /// Same as [`Self::next`], but runs on a connection the caller already holds, typically an
    /// open transaction so that the allocation rolls back together with the insert it feeds.
    /// # Errors
    /// Fails only if the store is unavailable.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn next_in(conn: &mut SqliteConnection, sequence: &str) -> LibraryResult<i64> {
        // A single upsert is the increment-and-fetch, no read-then-write window
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO counters (name, seq)
            VALUES (?1, 1)
            ON CONFLICT(name) DO UPDATE SET seq = counters.seq + 1
            RETURNING seq;
        "#,
        )
        .bind(sequence)
        .fetch_one(&mut *conn)
        .await?;

        tracing::debug!(sequence, seq, "allocated sequence value");
        Ok(seq)
    }

    /// Reads the last value handed out for `sequence`, `None` if the counter does not exist.
    /// # Errors
    /// Fails only if the store is unavailable.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called rarely")]
    pub async fn current(&self, sequence: &str) -> LibraryResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::current_in(&mut conn, sequence).await
    }

    pub(crate) async fn current_in(
        conn: &mut SqliteConnection,
        sequence: &str,
    ) -> LibraryResult<Option<i64>> {
        let seq: Option<i64> = sqlx::query_scalar("SELECT seq FROM counters WHERE name = ?1")
            .bind(sequence)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(seq)
    }

    /// Raises the counter of `sequence` to `floor` if it is lower or absent. Never lowers it.
    pub(crate) async fn raise_in(
        conn: &mut SqliteConnection,
        sequence: &str,
        floor: i64,
    ) -> LibraryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO counters (name, seq)
            VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET seq = MAX(counters.seq, excluded.seq);
        "#,
        )
        .bind(sequence)
        .bind(floor)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Db;
    use crate::database::testing::file_db;
    use futures::future::join_all;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[tokio::test]
    async fn fresh_sequence_starts_at_one() {
        let db = Db::in_memory().await.unwrap();
        let allocator = SequenceAllocator::new(db.pool().clone());

        assert_eq!(allocator.current(BOOKS).await.unwrap(), None);
        assert_eq!(allocator.next(BOOKS).await.unwrap(), 1);
        assert_eq!(allocator.current(BOOKS).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn values_strictly_increase_per_sequence() {
        let db = Db::in_memory().await.unwrap();
        let allocator = SequenceAllocator::new(db.pool().clone());

        let mut books = Vec::new();
        for _ in 0..5 {
            books.push(allocator.next(BOOKS).await.unwrap());
        }
        let first_author = allocator.next(AUTHORS).await.unwrap();

        assert_eq!(books, vec![1, 2, 3, 4, 5]);
        // sequences are independent of each other
        assert_eq!(first_author, 1);
    }

    #[tokio::test]
    async fn concurrent_callers_never_share_a_value() {
        let db = Db::in_memory().await.unwrap();
        let allocator = SequenceAllocator::new(db.pool().clone());

        let results = join_all((0..50).map(|_| allocator.next(ISSUES))).await;
        let values: Vec<i64> = results.into_iter().map(Result::unwrap).collect();
        let unique: HashSet<i64> = values.iter().copied().collect();

        assert_eq!(unique.len(), 50);
        assert_eq!(unique.iter().max(), Some(&50));
        assert_eq!(allocator.current(ISSUES).await.unwrap(), Some(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_allocations_on_a_file_database_are_unique() {
        let (db, _dir) = file_db().await;
        let allocator = SequenceAllocator::new(db.pool().clone());

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.next(BOOKS).await })
            })
            .collect();
        let mut values: Vec<i64> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        values.sort_unstable();

        assert_eq!(values, (1..=40).collect::<Vec<i64>>());
        assert_eq!(allocator.current(BOOKS).await.unwrap(), Some(40));
    }

    #[tokio::test]
    async fn raise_never_lowers_a_counter() {
        let db = Db::in_memory().await.unwrap();
        let allocator = SequenceAllocator::new(db.pool().clone());
        let mut conn = db.pool().acquire().await.unwrap();

        SequenceAllocator::raise_in(&mut conn, AUTHORS, 7).await.unwrap();
        SequenceAllocator::raise_in(&mut conn, AUTHORS, 3).await.unwrap();
        drop(conn);

        assert_eq!(allocator.current(AUTHORS).await.unwrap(), Some(7));
        assert_eq!(allocator.next(AUTHORS).await.unwrap(), 8);
    }
}
