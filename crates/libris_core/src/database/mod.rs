//! Database library
//!
//! Exposes the `Db` struct that owns the `SQLite` connection pool backing every entity table and
//! the sequence counters, plus the record types stored in it.
pub mod types;

use crate::errors::LibraryResult;
use core::str::FromStr as _;
use core::time::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;

/// Error type of the underlying store, carried by `LibraryError::StoreUnavailable`.
pub use sqlx::Error as StoreError;

pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Opens (and creates if missing) the library database at `path` and applies the embedded
    /// migrations.
    /// # Errors
    /// Fails if the file cannot be opened or a migration fails.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at start of program"
    )]
    pub async fn init(path: &Path) -> LibraryResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!().run(&pool).await?;
        tracing::info!(path = %path.display(), "library database ready");

        Ok(Self { pool })
    }

    /// Opens a private in-memory database. The pool is pinned to a single connection that never
    /// expires, since every connection to `:memory:` would otherwise see its own empty database.
    /// # Errors
    /// Fails if `SQLite` cannot be initialized or a migration fails.
    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once per test or ephemeral run"
    )]
    pub async fn in_memory() -> LibraryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    #[must_use]
    #[inline]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[allow(
        clippy::missing_inline_in_public_items,
        reason = "Called once at end of program"
    )]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Opens a transaction holding the write lock from the start (`BEGIN IMMEDIATE`). A deferred
/// transaction that reads first fails with `SQLITE_BUSY` when it tries to write while another
/// connection is writing, the busy timeout only applies to taking the lock.
pub(crate) async fn begin_write(
    pool: &SqlitePool,
) -> LibraryResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
