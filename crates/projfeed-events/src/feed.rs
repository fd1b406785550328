//! Reading the project feed.
//!
//! Events and their comments are loaded with two queries and joined here,
//! so the store never needs to understand nested selects.

use std::collections::HashMap;

use projfeed_core::{
  event::{Event, FeedEvent},
  record::{EstimateTask, EventComment, Record},
  registry::Selection,
  store::{DataStore, Filter, Order, Query, Row},
};

use crate::{Error, EventService, Result};

impl<S: DataStore> EventService<S> {
  /// Events of `project_id` selected by `type_key`, newest first, each with
  /// its comments.
  ///
  /// `"feed"` selects every event type except `comment.added`; any other key
  /// must name a registry entry.
  #[tracing::instrument(skip(self))]
  pub async fn load_events(&self, project_id: i64, type_key: &str) -> Result<Vec<FeedEvent>> {
    let selection = self
      .registry
      .resolve(type_key)
      .map_err(|_| Error::Validation(format!("unknown event type key: {type_key}")))?;

    let query = Query::all()
      .filter(Filter::eq("project_id", project_id))
      .order(Order::desc("created_at"))
      .order(Order::desc("id"));
    let query = match selection {
      Selection::Feed => query.filter(Filter::neq("event_type", Selection::FEED_EXCLUDES)),
      Selection::Types(types) => query.filter(Filter::any_of("event_type", types)),
    };

    let events: Vec<Event> = self.fetch(Event::TABLE, &query).await?;
    if events.is_empty() {
      return Ok(Vec::new());
    }

    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    let comments: Vec<EventComment> = self
      .fetch(
        EventComment::TABLE,
        &Query::all()
          .filter(Filter::any_of("event_id", ids))
          .order(Order::asc("created_at"))
          .order(Order::asc("id")),
      )
      .await?;

    let mut by_event: HashMap<i64, Vec<EventComment>> = HashMap::new();
    for comment in comments {
      by_event.entry(comment.event_id).or_default().push(comment);
    }

    tracing::debug!(events = events.len(), "feed loaded");
    Ok(
      events
        .into_iter()
        .map(|event| {
          let event_comments = by_event.remove(&event.id).unwrap_or_default();
          FeedEvent { event, event_comments }
        })
        .collect(),
    )
  }

  /// The line items of an estimate in `sort_order`.
  #[tracing::instrument(skip(self))]
  pub async fn load_estimate_tasks(&self, estimate_id: i64) -> Result<Vec<EstimateTask>> {
    self
      .fetch(
        EstimateTask::TABLE,
        &Query::all()
          .filter(Filter::eq("estimate_id", estimate_id))
          .order(Order::asc("sort_order")),
      )
      .await
  }

  async fn fetch<R: Record>(&self, table: &str, query: &Query) -> Result<Vec<R>> {
    let page = self.store.query(table, query).await.map_err(Error::store)?;
    decode_all(page.rows)
  }
}

fn decode_all<R: Record>(rows: Vec<Row>) -> Result<Vec<R>> {
  Ok(rows.into_iter().map(R::from_row).collect::<Result<_, _>>()?)
}
