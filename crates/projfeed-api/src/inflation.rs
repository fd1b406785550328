//! Handlers for inflation adjustment.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/inflation?value=&from=&to=` | Convert between years' dollars |
//! | `POST` | `/inflation/invalidate` | Reload the index on next use |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use projfeed_core::store::ScopedStore;
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct InflateParams {
  pub value: f64,
  pub from:  i32,
  pub to:    i32,
}

#[derive(Debug, Serialize)]
pub struct Inflated {
  pub value:  f64,
  pub from:   i32,
  pub to:     i32,
  pub result: f64,
}

/// `GET /inflation?value=<amount>&from=<year>&to=<year>`
pub async fn inflate<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<InflateParams>,
) -> Result<Json<Inflated>, ApiError>
where
  S: ScopedStore + 'static,
{
  if !params.value.is_finite() {
    return Err(ApiError::BadRequest("value must be a finite number".into()));
  }
  let result = state.inflation.inflate(params.value, params.from, params.to).await;
  Ok(Json(Inflated { value: params.value, from: params.from, to: params.to, result }))
}

/// `POST /inflation/invalidate`
pub async fn invalidate<S>(State(state): State<ApiState<S>>) -> StatusCode
where
  S: ScopedStore + 'static,
{
  state.inflation.invalidate();
  StatusCode::NO_CONTENT
}
