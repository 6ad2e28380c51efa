//! `libris_core`
//!
//! Core library of Libris, the lending backend of a single library branch. It owns the store
//! and every rule that spans more than one record: the sequential ids of authors, books and
//! issues, the startup backfill of ids for legacy records, and the copy counts that follow
//! books being issued and returned. Frontends (the HTTP server) only translate requests into
//! calls on [`services::Library`].

pub mod backfill;
pub mod database;
pub mod errors;
pub mod inventory;
pub mod sequence;
pub mod services;
pub mod sorting;

pub use errors::{LibraryError, LibraryResult};
pub use services::Library;
