//! Error types for `ttn-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read schema: {0}")]
  Io(#[from] std::io::Error),

  #[error("schema is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid schema: {0}")]
  InvalidSchema(String),

  #[error("invalid pattern {pattern:?} in schema: {source}")]
  InvalidPattern {
    pattern: String,
    #[source]
    source:  regex::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
