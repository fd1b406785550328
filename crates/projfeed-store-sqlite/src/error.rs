//! Error type for `projfeed-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Table, column or select-list names must be plain SQL identifiers.
  #[error("invalid identifier: {0:?}")]
  InvalidIdentifier(String),

  #[error("filter on {0:?} needs an array value")]
  ExpectedArray(String),

  #[error("unsupported column value in {0:?}")]
  UnsupportedValue(String),

  #[error("no row in {table} where {column} = {value}")]
  NotFound {
    table:  String,
    column: String,
    value:  String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
