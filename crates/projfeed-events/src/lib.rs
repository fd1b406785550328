//! The projfeed event service.
//!
//! Every domain write (note, comment, estimate, comment on an event) is
//! recorded as a primary row plus a companion [`Event`] row. Writes carrying
//! a client request id are idempotent: a retried submission returns the
//! result of the first one instead of writing again.
//!
//! The service is generic over any [`DataStore`]; the acting user is whoever
//! the store reports through [`DataStore::user_id`].

pub mod error;
pub mod feed;
pub mod guard;
pub mod inflation;
pub mod reconcile;
mod recorder;

use std::sync::Arc;

use projfeed_core::{
  event::Event,
  record::EstimateTask,
  registry::EventRegistry,
  store::{DataStore, ScopedStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{Error, Result};
pub use inflation::{InflationIndex, InflationService};

#[cfg(test)]
mod tests;

// ─── Config ──────────────────────────────────────────────────────────────────

/// Behavioural switches for [`EventService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
  /// When a replayed request finds its record but no event, finish the
  /// interrupted write instead of returning `event: None`.
  #[serde(default = "default_repair")]
  pub repair_on_replay: bool,
}

fn default_repair() -> bool { true }

impl Default for ServiceConfig {
  fn default() -> Self { Self { repair_on_replay: default_repair() } }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// The outcome of a recorded write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recorded<T> {
  pub record:   T,
  /// `None` only when a replay found the record without its event.
  pub event:    Option<Event>,
  /// Estimate line items, in `sort_order`. Empty for other records.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub tasks:    Vec<EstimateTask>,
  /// `true` when the request id had already been applied.
  pub replayed: bool,
}

impl<T> Recorded<T> {
  fn fresh(record: T, event: Event, tasks: Vec<EstimateTask>) -> Self {
    Self { record, event: Some(event), tasks, replayed: false }
  }

  fn replay(record: T, event: Option<Event>, tasks: Vec<EstimateTask>) -> Self {
    Self { record, event, tasks, replayed: true }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Idempotent writer and feed reader over a [`DataStore`].
#[derive(Clone)]
pub struct EventService<S> {
  store:    S,
  registry: Arc<EventRegistry>,
  config:   ServiceConfig,
}

impl<S: DataStore> EventService<S> {
  pub fn new(store: S, registry: Arc<EventRegistry>) -> Self {
    Self { store, registry, config: ServiceConfig::default() }
  }

  pub fn with_config(mut self, config: ServiceConfig) -> Self {
    self.config = config;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn registry(&self) -> &EventRegistry { &self.registry }

  pub fn config(&self) -> ServiceConfig { self.config }

  /// A copy of this service whose store acts as `user`.
  pub fn scoped_to(&self, user: Uuid) -> Self
  where
    S: ScopedStore,
  {
    Self {
      store:    self.store.scoped_to(user),
      registry: Arc::clone(&self.registry),
      config:   self.config,
    }
  }

  /// The acting user; writes are refused without one.
  async fn actor(&self) -> Result<Uuid> {
    self
      .store
      .user_id()
      .await
      .map_err(Error::store)?
      .ok_or(Error::Auth)
  }
}

/// Trim a client request id; blank ids are treated as absent.
fn normalize_req_id(id: Option<String>) -> Option<String> {
  id.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} must not be empty")));
  }
  Ok(())
}
