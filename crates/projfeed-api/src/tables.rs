//! Generic CRUD over the tables of the [`TableRegistry`](projfeed_core::tables::TableRegistry).
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/tables` | Registered table definitions |
//! | `GET`    | `/tables/{name}/rows` | `?page&page_size&search&<filter>=<value>...` |
//! | `POST`   | `/tables/{name}/rows` | Body: a row object; 201 |
//! | `PATCH`  | `/tables/{name}/rows/{pk}` | Body: the changed columns |
//! | `DELETE` | `/tables/{name}/rows/{pk}` | 204 |
//!
//! Unregistered tables answer 404. Writes require an acting user.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use projfeed_core::{
  store::{DataStore, Page, Row, ScopedStore},
  tables::{ListRequest, TableDef},
};
use projfeed_events::inflation::INFLATORS_TABLE;
use serde_json::Value;

use crate::{Actor, ApiState, error::ApiError};

/// `GET /tables`
pub async fn registry<S>(State(state): State<ApiState<S>>) -> Json<Vec<TableDef>>
where
  S: ScopedStore + 'static,
{
  Json(state.tables.tables().to_vec())
}

fn require_actor(actor: Actor) -> Result<(), ApiError> {
  match actor.0 {
    Some(_) => Ok(()),
    None => Err(ApiError::Unauthorized("not authenticated".into())),
  }
}

/// Writes to the inflators table make the cached inflation index stale.
fn after_write<S>(state: &ApiState<S>, def: &TableDef)
where
  S: ScopedStore + 'static,
{
  if def.table == INFLATORS_TABLE {
    state.inflation.invalidate();
  }
}

fn parse_number(key: &str, raw: &str) -> Result<u32, ApiError> {
  raw
    .trim()
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("{key} must be a positive integer, got {raw:?}")))
}

/// Split raw query pairs into paging, search and column filters. Empty
/// values are ignored.
pub fn list_request(pairs: Vec<(String, String)>) -> Result<ListRequest, ApiError> {
  let mut request = ListRequest::default();
  for (key, value) in pairs {
    if value.trim().is_empty() {
      continue;
    }
    match key.as_str() {
      "page" => request.page = Some(parse_number(&key, &value)?),
      "page_size" => request.page_size = Some(parse_number(&key, &value)?),
      "search" => request.search = Some(value),
      _ => request.filters.push((key, value)),
    }
  }
  Ok(request)
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /tables/{name}/rows`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(name): Path<String>,
  Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Page>, ApiError>
where
  S: ScopedStore + 'static,
{
  let def = state.tables.get(&name)?;
  let query = def.list_query(&list_request(pairs)?)?;
  let page = state
    .store_for(actor)
    .query(&def.table, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

// ─── Insert ───────────────────────────────────────────────────────────────────

/// `POST /tables/{name}/rows`
pub async fn insert<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path(name): Path<String>,
  Json(row): Json<Row>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScopedStore + 'static,
{
  require_actor(actor)?;
  let def = state.tables.get(&name)?;
  def.validate_insert(&row)?;

  let inserted = state
    .store_for(actor)
    .insert(&def.table, row)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(table = %def.table, "row inserted");
  after_write(&state, def);
  Ok((StatusCode::CREATED, Json(inserted)))
}

// ─── Update / delete ──────────────────────────────────────────────────────────

/// Resolve the primary key in the path and make sure the row exists.
async fn existing<S: DataStore>(store: &S, def: &TableDef, raw_pk: &str) -> Result<Value, ApiError> {
  let pk = def.coerce(&def.pk, raw_pk)?;
  store
    .find_one(&def.table, &def.pk, &pk, Some(&def.pk))
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("{} row {raw_pk} not found", def.table)))?;
  Ok(pk)
}

/// `PATCH /tables/{name}/rows/{pk}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path((name, raw_pk)): Path<(String, String)>,
  Json(patch): Json<Row>,
) -> Result<Json<Row>, ApiError>
where
  S: ScopedStore + 'static,
{
  require_actor(actor)?;
  let def = state.tables.get(&name)?;
  def.validate_update(&patch)?;

  let store = state.store_for(actor);
  let pk = existing(&store, def, &raw_pk).await?;
  let updated = store
    .update(&def.table, &def.pk, &pk, patch)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(table = %def.table, pk = %raw_pk, "row updated");
  after_write(&state, def);
  Ok(Json(updated))
}

/// `DELETE /tables/{name}/rows/{pk}`
pub async fn delete<S>(
  State(state): State<ApiState<S>>,
  actor: Actor,
  Path((name, raw_pk)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  S: ScopedStore + 'static,
{
  require_actor(actor)?;
  let def = state.tables.get(&name)?;

  let store = state.store_for(actor);
  let pk = existing(&store, def, &raw_pk).await?;
  store.delete(&def.table, &def.pk, &pk).await.map_err(ApiError::store)?;
  tracing::info!(table = %def.table, pk = %raw_pk, "row deleted");
  after_write(&state, def);
  Ok(StatusCode::NO_CONTENT)
}
