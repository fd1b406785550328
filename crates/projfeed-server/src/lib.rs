//! HTTP server wiring for projfeed.
//!
//! Combines the JSON API router with Basic authentication, which resolves
//! the acting user of every request, and request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use projfeed_api::{ApiState, api_router};
use projfeed_core::{registry::EventRegistry, store::ScopedStore, tables::TableRegistry};
use projfeed_events::ServiceConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, UserConfig, authenticate};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("projfeed.db") }

fn yes() -> bool { true }

/// Runtime server configuration, deserialised from `config.toml` and
/// `PROJFEED_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_store_path")]
  pub store_path:       PathBuf,
  /// Complete writes that an earlier attempt left without an event.
  #[serde(default = "yes")]
  pub repair_on_replay: bool,
  #[serde(default)]
  pub users:            Vec<UserConfig>,
  /// Replaces the built-in event type registry when set.
  #[serde(default)]
  pub event_types:      Option<EventRegistry>,
  /// Replaces the built-in table registry when set.
  #[serde(default)]
  pub tables:           Option<TableRegistry>,
}

impl ServerConfig {
  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig { repair_on_replay: self.repair_on_replay }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server.
#[derive(Clone)]
pub struct AppState<S> {
  pub api:  ApiState<S>,
  pub auth: Arc<AuthConfig>,
}

impl<S: ScopedStore + 'static> AppState<S> {
  pub fn new(store: S, config: &ServerConfig) -> Self {
    let registry = config.event_types.clone().unwrap_or_default();
    let tables = config.tables.clone().unwrap_or_default();
    Self {
      api:  ApiState::new(
        store,
        Arc::new(registry),
        Arc::new(tables),
        config.service_config(),
      ),
      auth: Arc::new(AuthConfig { users: config.users.clone() }),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's [`Router`]: every route requires Basic auth.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ScopedStore + 'static,
{
  api_router(state.api)
    .layer(middleware::from_fn_with_state(state.auth, authenticate))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use projfeed_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  fn config(user_id: Uuid) -> ServerConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();

    ServerConfig {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      store_path:       PathBuf::from(":memory:"),
      repair_on_replay: true,
      users:            vec![UserConfig {
        username: "user".to_string(),
        password_hash: hash,
        user_id,
      }],
      event_types:      None,
      tables:           None,
    }
  }

  async fn app(user_id: Uuid) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    router(AppState::new(store, &config(user_id)))
  }

  fn note_request(auth: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
      .method("POST")
      .uri("/projects/1/notes")
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
      req = req.header(header::AUTHORIZATION, auth);
    }
    req.body(Body::from(r#"{"body":"hello"}"#)).unwrap()
  }

  #[tokio::test]
  async fn requests_without_credentials_are_challenged() {
    let res = app(Uuid::new_v4()).await.oneshot(note_request(None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn authenticated_writes_are_attributed_to_the_user() {
    let user_id = Uuid::new_v4();
    let auth = format!("Basic {}", B64.encode("user:secret"));

    let res = app(user_id).await.oneshot(note_request(Some(&auth))).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["record"]["author_id"], serde_json::json!(user_id));
    assert_eq!(body["event"]["actor_id"], serde_json::json!(user_id));
  }

  #[test]
  fn config_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          port = 9000

          [[users]]
          username = "a"
          password_hash = "x"
          user_id = "6f1c2b9e-6a53-4c1e-9d0e-1a2b3c4d5e6f"
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9000);
    assert!(cfg.repair_on_replay);
    assert_eq!(cfg.users.len(), 1);
    assert!(cfg.event_types.is_none());
  }
}
