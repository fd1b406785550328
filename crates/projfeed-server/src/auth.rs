//! HTTP Basic-auth verification and the middleware that resolves the acting
//! user of each request.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use projfeed_api::Actor;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Error;

/// One account allowed to use this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// The id recorded as author/actor for this user's writes.
  pub user_id:       Uuid,
}

/// Credentials accepted as valid for this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

/// Verify the `Authorization` header and return the matching user's id.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Uuid, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(user.user_id)
}

/// Reject unauthenticated requests; tag authenticated ones with their
/// [`Actor`].
pub async fn authenticate(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Response {
  match verify_auth(req.headers(), &auth) {
    Ok(user) => {
      req.extensions_mut().insert(Actor(Some(user)));
      next.run(req).await
    }
    Err(e) => {
      tracing::debug!(uri = %req.uri(), "rejected unauthenticated request");
      e.into_response()
    }
  }
}
