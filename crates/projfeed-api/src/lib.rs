//! JSON REST API for projfeed.
//!
//! Exposes an axum [`Router`] backed by any [`ScopedStore`]. Authentication,
//! TLS and transport concerns are the caller's responsibility: the caller
//! resolves the acting user and inserts an [`Actor`] into the request
//! extensions before the request reaches this router.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", projfeed_api::api_router(state.clone()))
//! ```

pub mod actor;
pub mod error;
pub mod events;
pub mod inflation;
pub mod tables;
pub mod writes;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use projfeed_core::{registry::EventRegistry, store::ScopedStore, tables::TableRegistry};
use projfeed_events::{EventService, InflationService, ServiceConfig};

pub use actor::Actor;
pub use error::ApiError;


/// Everything the handlers need, shared across requests.
pub struct ApiState<S> {
  pub store:     S,
  pub events:    EventService<S>,
  pub tables:    Arc<TableRegistry>,
  pub inflation: InflationService<S>,
}

impl<S: Clone> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:     self.store.clone(),
      events:    self.events.clone(),
      tables:    Arc::clone(&self.tables),
      inflation: self.inflation.clone(),
    }
  }
}

impl<S: ScopedStore + 'static> ApiState<S> {
  pub fn new(
    store: S,
    registry: Arc<EventRegistry>,
    tables: Arc<TableRegistry>,
    config: ServiceConfig,
  ) -> Self {
    Self {
      events: EventService::new(store.clone(), registry).with_config(config),
      inflation: InflationService::new(store.clone()),
      store,
      tables,
    }
  }

  /// The event service acting as `actor`. Without an actor the unscoped
  /// service is returned, whose writes fail as unauthenticated.
  pub fn events_for(&self, actor: Actor) -> EventService<S> {
    match actor.0 {
      Some(user) => self.events.scoped_to(user),
      None => self.events.clone(),
    }
  }

  /// The store acting as `actor`.
  pub fn store_for(&self, actor: Actor) -> S {
    match actor.0 {
      Some(user) => self.store.scoped_to(user),
      None => self.store.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: ScopedStore + 'static,
{
  Router::new()
    // Feed
    .route("/projects/{id}/events", get(events::list::<S>))
    .route("/event-types", get(events::types::<S>))
    .route("/estimates/{id}/tasks", get(events::tasks::<S>))
    // Writes
    .route("/projects/{id}/notes", post(writes::note::<S>))
    .route("/projects/{id}/comments", post(writes::comment::<S>))
    .route("/projects/{id}/estimates", post(writes::estimate::<S>))
    .route("/events/{id}/comments", post(writes::event_comment::<S>))
    // Tables
    .route("/tables", get(tables::registry::<S>))
    .route("/tables/{name}/rows", get(tables::list::<S>).post(tables::insert::<S>))
    .route(
      "/tables/{name}/rows/{pk}",
      patch(tables::update::<S>).delete(tables::delete::<S>),
    )
    // Inflation
    .route("/inflation", get(inflation::inflate::<S>))
    .route("/inflation/invalidate", post(inflation::invalidate::<S>))
    .with_state(state)
}
