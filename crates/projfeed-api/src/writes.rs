//! Handlers for recorded writes.
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | `POST` | `/projects/{id}/notes` | `{"body", "parent_note_id"?, "client_req_id"?}` |
//! | `POST` | `/projects/{id}/comments` | `{"body", "parent_comment_id"?, "client_req_id"?}` |
//! | `POST` | `/projects/{id}/estimates` | `{"estimate_type", "status"?, "estimate_date"?, "estimate_award_year"?, "tasks"?, "client_req_id"?}` |
//! | `POST` | `/events/{id}/comments` | `{"body", "parent_comment_id"?, "client_req_id"?}` |
//!
//! A first write answers `201 Created`; a replayed request id answers `200 OK`
//! with the original result.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use projfeed_core::{
  record::{NewComment, NewEstimate, NewEventComment, NewNote, NewTask},
  store::ScopedStore,
};
use projfeed_events::Recorded;
use serde::{Deserialize, Serialize};

use crate::{Actor, ApiState, error::ApiError};

fn respond<T: Serialize>(recorded: Recorded<T>) -> impl IntoResponse {
  let status = if recorded.replayed { StatusCode::OK } else { StatusCode::CREATED };
  (status, Json(recorded))
}

// ─── Notes and comments ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NoteBody {
  pub body:           String,
  #[serde(default)]
  pub parent_note_id: Option<i64>,
  #[serde(default)]
  pub client_req_id:  Option<String>,
}

/// Body shared by project comments and event comments.
#[derive(Debug, Deserialize)]
pub struct CommentBody {
  pub body:              String,
  #[serde(default)]
  pub parent_comment_id: Option<i64>,
  #[serde(default)]
  pub client_req_id:     Option<String>,
}

/// `POST /projects/{id}/notes`
pub async fn note<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(project_id): Path<i64>,
  Json(body): Json<NoteBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScopedStore + 'static,
{
  let recorded = state
    .events_for(actor)
    .add_note(NewNote {
      project_id,
      body: body.body,
      parent_note_id: body.parent_note_id,
      client_req_id: body.client_req_id,
    })
    .await?;
  Ok(respond(recorded))
}

/// `POST /projects/{id}/comments`
pub async fn comment<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(project_id): Path<i64>,
  Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScopedStore + 'static,
{
  let recorded = state
    .events_for(actor)
    .add_comment(NewComment {
      project_id,
      body: body.body,
      parent_comment_id: body.parent_comment_id,
      client_req_id: body.client_req_id,
    })
    .await?;
  Ok(respond(recorded))
}

/// `POST /events/{id}/comments`
pub async fn event_comment<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(event_id): Path<i64>,
  Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScopedStore + 'static,
{
  let recorded = state
    .events_for(actor)
    .add_event_comment(NewEventComment {
      event_id,
      body: body.body,
      parent_comment_id: body.parent_comment_id,
      client_req_id: body.client_req_id,
    })
    .await?;
  Ok(respond(recorded))
}

// ─── Estimates ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EstimateBody {
  pub estimate_type:       String,
  #[serde(default)]
  pub status:              Option<String>,
  #[serde(default)]
  pub estimate_date:       Option<NaiveDate>,
  #[serde(default)]
  pub estimate_award_year: Option<i32>,
  #[serde(default)]
  pub tasks:               Vec<NewTask>,
  #[serde(default)]
  pub client_req_id:       Option<String>,
}

/// `POST /projects/{id}/estimates`
pub async fn estimate<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(project_id): Path<i64>,
  Json(body): Json<EstimateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScopedStore + 'static,
{
  let recorded = state
    .events_for(actor)
    .add_estimate(NewEstimate {
      project_id,
      estimate_type: body.estimate_type,
      status: body.status,
      estimate_date: body.estimate_date,
      estimate_award_year: body.estimate_award_year,
      tasks: body.tasks,
      client_req_id: body.client_req_id,
    })
    .await?;
  Ok(respond(recorded))
}
