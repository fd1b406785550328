//! The idempotency guard.
//!
//! Before a write, the guard looks for a row in the target table carrying the
//! same client request id. A hit means the request was already applied, and
//! the prior record (plus its event, if one was written) is returned instead.

use projfeed_core::{
  event::Event,
  record::Record,
  store::{DataStore, Filter, Query},
};
use serde_json::Value;

use crate::{Error, Result};

/// The result of an earlier application of the same request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prior<R> {
  pub record: R,
  /// Missing when the earlier attempt failed between the domain insert and
  /// the event insert.
  pub event:  Option<Event>,
}

/// Look up a prior application of `client_req_id` in `R`'s table.
///
/// Returns `None` when the id is absent or has not been seen. Store failures
/// propagate.
pub async fn find_prior<S, R>(
  store: &S,
  client_req_id: Option<&str>,
) -> Result<Option<Prior<R>>>
where
  S: DataStore,
  R: Record,
{
  let Some(id) = client_req_id.filter(|id| !id.is_empty()) else {
    return Ok(None);
  };

  let Some(row) = store
    .find_one(R::TABLE, "client_req_id", &Value::from(id), None)
    .await
    .map_err(Error::store)?
  else {
    return Ok(None);
  };

  let record = R::from_row(row)?;
  let event = find_event(store, R::TABLE, record.id()).await?;
  tracing::debug!(
    table = R::TABLE,
    id = record.id(),
    has_event = event.is_some(),
    "client request already applied"
  );
  Ok(Some(Prior { record, event }))
}

/// The event whose subject is `table`/`subject_id`, if any.
pub async fn find_event<S: DataStore>(
  store: &S,
  table: &str,
  subject_id: i64,
) -> Result<Option<Event>> {
  let query = Query::first(1)
    .filter(Filter::eq("subject_id", subject_id))
    .filter(Filter::eq("subject_table", table));

  let page = store.query(Event::TABLE, &query).await.map_err(Error::store)?;
  Ok(page.rows.into_iter().next().map(Event::from_row).transpose()?)
}
