//! Id backfill
//!
//! Records imported before sequential ids existed carry only their opaque reference. At startup,
//! before any request is served, every entity table is reconciled: rows without an `id` receive
//! one in creation order, continuing after the highest id in use, and the sequence counter is
//! raised past the last id handed out so that the allocator never repeats one.
use crate::database::begin_write;
use crate::database::types::RecordRef;
use crate::errors::LibraryResult;
use crate::sequence::{self, SequenceAllocator};
use core::cmp::max;
use sqlx::SqlitePool;
use tracing::instrument;

/// The entity tables that carry a sequential id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Author,
    Book,
    Issue,
}

impl EntityKind {
    pub const ALL: [Self; 3] = [Self::Author, Self::Book, Self::Issue];

    #[must_use]
    #[inline]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Author => "authors",
            Self::Book => "books",
            Self::Issue => "issues",
        }
    }

    #[must_use]
    #[inline]
    pub const fn sequence(self) -> &'static str {
        match self {
            Self::Author => sequence::AUTHORS,
            Self::Book => sequence::BOOKS,
            Self::Issue => sequence::ISSUES,
        }
    }

    #[must_use]
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Book => "book",
            Self::Issue => "issue",
        }
    }
}

/// Outcome of reconciling one entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kind: EntityKind,
    /// Number of rows that received an id
    pub backfilled: usize,
    /// Highest id in use after reconciliation, the counter is at least this value
    pub cursor: i64,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    #[must_use]
    #[inline]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Assigns ids to every row of `kind` lacking one and brings the sequence counter up to
    /// date. Runs in a single transaction, so either all rows are numbered and the counter is
    /// raised, or nothing changes.
    /// # Errors
    /// Fails if the store is unavailable, in which case startup must not proceed.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once per table at startup")]
    #[instrument(name = "backfill.reconcile", skip(self), fields(table = kind.table()))]
    pub async fn reconcile(&self, kind: EntityKind) -> LibraryResult<ReconcileReport> {
        let table = kind.table();
        let mut tx = begin_write(&self.pool).await?;

        let max_assigned: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(MAX(id), 0) FROM {table} WHERE id IS NOT NULL"
        ))
        .fetch_one(&mut *tx)
        .await?;
        let counter = SequenceAllocator::current_in(&mut tx, kind.sequence()).await?;
        let mut cursor = max(max_assigned, counter.unwrap_or(0));

        // Earliest created rows get the lowest ids, rowid keeps equal timestamps deterministic
        let missing: Vec<RecordRef> = sqlx::query_scalar(&format!(
            "SELECT record_ref FROM {table} WHERE id IS NULL ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&mut *tx)
        .await?;

        let assign = format!("UPDATE {table} SET id = ?1 WHERE record_ref = ?2");
        for record_ref in &missing {
            cursor += 1;
            sqlx::query(&assign)
                .bind(cursor)
                .bind(record_ref)
                .execute(&mut *tx)
                .await?;
        }

        if counter.is_none_or(|seq| seq < cursor) {
            SequenceAllocator::raise_in(&mut tx, kind.sequence(), cursor).await?;
        }
        tx.commit().await?;

        if !missing.is_empty() {
            tracing::info!(
                "backfilled {} {} ids up to {cursor}",
                missing.len(),
                kind.label()
            );
        }

        Ok(ReconcileReport {
            kind,
            backfilled: missing.len(),
            cursor,
        })
    }

    /// Reconciles authors, books and issues, in that order, stopping at the first failure.
    /// # Errors
    /// Propagates the first failing reconciliation.
    #[allow(clippy::missing_inline_in_public_items, reason = "Called once at startup")]
    pub async fn reconcile_all(&self) -> LibraryResult<Vec<ReconcileReport>> {
        let mut reports = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            reports.push(self.reconcile(kind).await?);
        }
        Ok(reports)
    }
}
