//! Error type for the event service.

use thiserror::Error;

/// Errors returned by [`EventService`](crate::EventService) operations.
#[derive(Debug, Error)]
pub enum Error {
  /// No acting user could be resolved.
  #[error("not authenticated")]
  Auth,

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// A failure reported by the data store, passed through uninterpreted.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// A row the store returned could not be decoded.
  #[error(transparent)]
  Decode(#[from] projfeed_core::Error),
}

impl Error {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
