//! Error type for `ttn-index-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The on-disk layout was written by a different version of the software.
  /// Handled internally by rebuilding; never returned from `open_or_create`.
  #[error("index version mismatch: found {found:?}, expected {expected}")]
  VersionMismatch { found: Option<i64>, expected: i64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
