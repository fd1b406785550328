//! The acting user of a request.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// The authenticated user, if any, as placed in the request extensions by
/// the server's auth layer. Extracting never fails; a request without an
/// actor extension has `Actor(None)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor(pub Option<Uuid>);

impl<St: Send + Sync> FromRequestParts<St> for Actor {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _: &St) -> Result<Self, Self::Rejection> {
    Ok(parts.extensions.get::<Actor>().copied().unwrap_or_default())
  }
}
