//! Error types for `projfeed-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown event type key: {0}")]
  UnknownEventType(String),

  #[error("unknown table: {0}")]
  UnknownTable(String),

  #[error("unknown column {column:?} on table {table:?}")]
  UnknownColumn { table: String, column: String },

  #[error("column {column:?} is required on table {table:?}")]
  MissingColumn { table: String, column: String },

  #[error("column {column:?} on table {table:?} is not editable")]
  ReadOnlyColumn { table: String, column: String },

  #[error("invalid value for column {column:?}: {value:?}")]
  InvalidValue { column: String, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
