//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

impl From<projfeed_events::Error> for ApiError {
  fn from(err: projfeed_events::Error) -> Self {
    use projfeed_events::Error as E;
    match err {
      E::Auth => Self::Unauthorized(err.to_string()),
      E::Validation(m) => Self::BadRequest(m),
      E::NotFound(m) => Self::NotFound(m),
      E::Store(e) => Self::Store(e),
      E::Decode(e) => Self::store(e),
    }
  }
}

impl From<projfeed_core::Error> for ApiError {
  fn from(err: projfeed_core::Error) -> Self {
    use projfeed_core::Error as E;
    match err {
      E::UnknownTable(_) => Self::NotFound(err.to_string()),
      E::Serialization(e) => Self::store(e),
      other => Self::BadRequest(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
