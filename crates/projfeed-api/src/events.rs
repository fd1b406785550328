//! Handlers for the project feed.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/projects/{id}/events` | Optional `?type=<key>`, default `feed` |
//! | `GET`  | `/event-types` | The event type registry |
//! | `GET`  | `/estimates/{id}/tasks` | Line items in `sort_order` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use projfeed_core::{
  event::{Event, FeedEvent},
  record::EstimateTask,
  registry::{EventTypeDef, FEED_KEY},
  render,
  store::ScopedStore,
  thread::{self, CommentNode},
};
use serde::{Deserialize, Serialize};

use crate::{Actor, ApiState, error::ApiError};

// ─── Feed ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FeedParams {
  #[serde(rename = "type")]
  pub type_key: Option<String>,
}

/// A feed event ready for display: the stored event plus its rendered
/// title, body and icon, and its comments as a reply tree.
#[derive(Debug, Serialize)]
pub struct FeedItem {
  #[serde(flatten)]
  pub event:    Event,
  pub title:    String,
  pub body:     String,
  pub icon:     String,
  pub comments: Vec<CommentNode>,
}

impl FeedItem {
  fn new(feed: FeedEvent, icon: String) -> Self {
    Self {
      title: render::title(&feed.event),
      body: render::body(&feed.event),
      icon,
      comments: thread::build(&feed.event_comments),
      event: feed.event,
    }
  }
}

/// `GET /projects/{id}/events[?type=<key>]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(project_id): Path<i64>,
  Query(params): Query<FeedParams>,
) -> Result<Json<Vec<FeedItem>>, ApiError>
where
  S: ScopedStore + 'static,
{
  let events = state.events_for(actor);
  let key = params.type_key.as_deref().unwrap_or(FEED_KEY);
  let feed = events.load_events(project_id, key).await?;

  let registry = events.registry();
  let items = feed
    .into_iter()
    .map(|f| {
      let icon = render::icon(registry, &f.event).to_owned();
      FeedItem::new(f, icon)
    })
    .collect();
  Ok(Json(items))
}

/// `GET /event-types`
pub async fn types<S>(State(state): State<ApiState<S>>) -> Json<Vec<EventTypeDef>>
where
  S: ScopedStore + 'static,
{
  Json(state.events.registry().defs().to_vec())
}

// ─── Estimate tasks ───────────────────────────────────────────────────────────

/// `GET /estimates/{id}/tasks`
pub async fn tasks<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(estimate_id): Path<i64>,
) -> Result<Json<Vec<EstimateTask>>, ApiError>
where
  S: ScopedStore + 'static,
{
  let tasks = state.events_for(actor).load_estimate_tasks(estimate_id).await?;
  Ok(Json(tasks))
}
