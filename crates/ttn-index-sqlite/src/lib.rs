//! SQLite backend for the tracker search index.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Full-text search uses FTS5 tables kept
//! in sync with the record tables by triggers.

mod encode;
mod index;
mod query;
mod schema;

pub mod error;

pub use error::{Error, Result};
pub use index::{DB_FILE, INDEX_VERSION, SqliteIndex};
