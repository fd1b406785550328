//! Service tests against a scripted in-memory store and against SQLite.

use std::{
  cmp::Ordering,
  collections::HashMap,
  sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use projfeed_core::{
  event::{COMMENT_ADDED, ESTIMATE_ADDED, NOTE_ADDED, SUMMARY_MAX},
  record::{NewComment, NewEstimate, NewEventComment, NewNote, NewTask},
  registry::{EventRegistry, EventTypeDef},
  store::{DataStore, Direction, FilterOp, Page, Query, Row, ScopedStore},
};
use projfeed_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Error, EventService, InflationService, ServiceConfig};

// ─── Scripted store ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MemError(String);

#[derive(Default)]
struct MemState {
  tables:      HashMap<String, Vec<Row>>,
  next_id:     i64,
  /// `"<op> <table>"` for every call, in order.
  calls:       Vec<String>,
  /// Inserts into this table fail while set.
  fail_insert: Option<String>,
  /// Queries fail while set.
  fail_query:  bool,
}

/// An in-memory `DataStore` that logs its calls and emulates the estimate
/// total trigger with its own rounding (whole dollars, rounded down), so
/// tests can tell a re-read total from one computed client-side.
#[derive(Clone, Default)]
struct MemStore {
  state: Arc<Mutex<MemState>>,
  user:  Option<Uuid>,
}

impl MemStore {
  fn as_user(user: Uuid) -> Self { Self { user: Some(user), ..Self::default() } }

  fn calls(&self) -> Vec<String> { self.state.lock().unwrap().calls.clone() }

  fn writes(&self) -> Vec<String> {
    self.calls().into_iter().filter(|c| c.starts_with("insert")).collect()
  }

  fn clear_calls(&self) { self.state.lock().unwrap().calls.clear(); }

  fn rows(&self, table: &str) -> Vec<Row> {
    self.state.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
  }

  fn fail_inserts_into(&self, table: Option<&str>) {
    self.state.lock().unwrap().fail_insert = table.map(str::to_owned);
  }

  fn fail_queries(&self, fail: bool) { self.state.lock().unwrap().fail_query = fail; }

  /// Insert a row verbatim, bypassing the call log.
  fn seed(&self, table: &str, row: Value) -> i64 {
    let mut state = self.state.lock().unwrap();
    state.next_id += 1;
    let id = state.next_id;
    let mut row = projfeed_core::store::row(row);
    row.insert("id".into(), json!(id));
    state.tables.entry(table.into()).or_default().push(row);
    id
  }
}

fn compare(a: &Value, b: &Value) -> Ordering {
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => x.total_cmp(&y),
    _ => a.to_string().cmp(&b.to_string()),
  }
}

fn matches(row: &Row, query: &Query) -> bool {
  query.filters.iter().all(|f| {
    let v = row.get(&f.key).unwrap_or(&Value::Null);
    match f.op {
      FilterOp::Eq => compare(v, &f.value).is_eq(),
      FilterOp::Neq => !compare(v, &f.value).is_eq(),
      FilterOp::In => f
        .value
        .as_array()
        .is_some_and(|vals| vals.iter().any(|x| compare(v, x).is_eq())),
      FilterOp::NotNull => !v.is_null(),
      FilterOp::IsNull => v.is_null(),
      FilterOp::Gt => compare(v, &f.value).is_gt(),
      FilterOp::Gte => compare(v, &f.value).is_ge(),
      FilterOp::Lt => compare(v, &f.value).is_lt(),
      FilterOp::Lte => compare(v, &f.value).is_le(),
    }
  })
}

fn recompute_total(state: &mut MemState, estimate_id: &Value) {
  let sum: f64 = state
    .tables
    .get("estimate_tasks")
    .into_iter()
    .flatten()
    .filter(|t| compare(&t["estimate_id"], estimate_id).is_eq())
    .filter_map(|t| t["amount"].as_f64())
    .sum();
  if let Some(estimates) = state.tables.get_mut("estimates") {
    for e in estimates.iter_mut().filter(|e| compare(&e["id"], estimate_id).is_eq()) {
      e.insert("total_amount".into(), json!(sum.floor()));
    }
  }
}

impl DataStore for MemStore {
  type Error = MemError;

  async fn user_id(&self) -> Result<Option<Uuid>, MemError> { Ok(self.user) }

  async fn query(&self, table: &str, query: &Query) -> Result<Page, MemError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("query {table}"));
    if state.fail_query {
      return Err(MemError("query failed".into()));
    }

    let mut rows: Vec<Row> = state
      .tables
      .get(table)
      .into_iter()
      .flatten()
      .filter(|r| matches(r, query))
      .cloned()
      .collect();
    rows.sort_by(|a, b| {
      query.order.iter().fold(Ordering::Equal, |acc, o| {
        acc.then_with(|| {
          let ord = compare(&a[o.col.as_str()], &b[o.col.as_str()]);
          if o.dir == Direction::Desc { ord.reverse() } else { ord }
        })
      })
    });

    let total = rows.len() as u64;
    if let Some((limit, offset)) = query.window() {
      rows = rows.into_iter().skip(offset as usize).take(limit as usize).collect();
    }
    Ok(Page { rows, total })
  }

  async fn insert(&self, table: &str, mut new: Row) -> Result<Row, MemError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("insert {table}"));
    if state.fail_insert.as_deref() == Some(table) {
      return Err(MemError(format!("insert into {table} failed")));
    }

    state.next_id += 1;
    let id = state.next_id;
    new.insert("id".into(), json!(id));
    new
      .entry("created_at")
      .or_insert_with(|| json!(format!("2024-01-01T00:00:{:02}Z", id % 60)));
    if table == "events" {
      new.entry("summary").or_insert_with(|| json!(""));
    }
    state.tables.entry(table.into()).or_default().push(new.clone());

    if table == "estimate_tasks" {
      recompute_total(&mut state, &new["estimate_id"]);
    }
    Ok(new)
  }

  async fn update(
    &self,
    table: &str,
    pk_field: &str,
    pk_value: &Value,
    patch: Row,
  ) -> Result<Row, MemError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("update {table}"));
    let row = state
      .tables
      .get_mut(table)
      .and_then(|rows| rows.iter_mut().find(|r| compare(&r[pk_field], pk_value).is_eq()))
      .ok_or_else(|| MemError("no such row".into()))?;
    row.extend(patch);
    Ok(row.clone())
  }

  async fn delete(&self, table: &str, pk_field: &str, pk_value: &Value) -> Result<(), MemError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("delete {table}"));
    if let Some(rows) = state.tables.get_mut(table) {
      rows.retain(|r| !compare(&r[pk_field], pk_value).is_eq());
    }
    Ok(())
  }

  async fn find_one(
    &self,
    table: &str,
    field: &str,
    value: &Value,
    _select: Option<&str>,
  ) -> Result<Option<Row>, MemError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("find_one {table}"));
    if state.fail_query {
      return Err(MemError("find_one failed".into()));
    }
    Ok(
      state
        .tables
        .get(table)
        .into_iter()
        .flatten()
        .find(|r| r.get(field).is_some_and(|v| compare(v, value).is_eq()))
        .cloned(),
    )
  }
}

fn service(store: MemStore) -> EventService<MemStore> {
  EventService::new(store, Arc::new(EventRegistry::default()))
}

fn estimate_input(req: Option<&str>) -> NewEstimate {
  NewEstimate {
    project_id: 7,
    estimate_type: "Construction".into(),
    status: None,
    estimate_date: NaiveDate::from_ymd_opt(2024, 3, 1),
    estimate_award_year: Some(2025),
    tasks: vec![
      NewTask { code: "A".into(), description: "Dig".into(), amount: 10.75 },
      NewTask { code: "B".into(), description: "Pour".into(), amount: 20.5 },
      NewTask { code: "C".into(), description: "Cure".into(), amount: 0.9 },
    ],
    client_req_id: req.map(str::to_owned),
  }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_note_writes_record_then_event() {
  let user = Uuid::new_v4();
  let store = MemStore::as_user(user);
  let svc = service(store.clone());

  let out = svc
    .add_note(NewNote {
      project_id: 7,
      body: "  Site   visit\n\ttomorrow  ".into(),
      client_req_id: Some("r-1".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert!(!out.replayed);
  assert_eq!(out.record.author_id, user);
  assert_eq!(out.record.body, "  Site   visit\n\ttomorrow  ");
  let event = out.event.unwrap();
  assert_eq!(event.event_type, NOTE_ADDED);
  assert_eq!(event.subject_table, "notes");
  assert_eq!(event.subject_id, out.record.id);
  assert_eq!(event.summary, "Site visit tomorrow");
  assert_eq!(event.payload["body_preview"], json!("  Site   visit\n\ttomorrow  "));
  assert_eq!(event.client_req_id.as_deref(), Some("r-1"));
  assert_eq!(store.writes(), vec!["insert notes", "insert events"]);
}

#[tokio::test]
async fn summary_is_capped() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store);

  let body = "word ".repeat(100);
  let out = svc
    .add_comment(NewComment { project_id: 1, body: body.clone(), ..Default::default() })
    .await
    .unwrap();

  let event = out.event.unwrap();
  assert_eq!(event.event_type, COMMENT_ADDED);
  assert!(event.summary.chars().count() <= SUMMARY_MAX);
  assert!(!event.summary.ends_with(' '));
  assert_eq!(event.payload["body_preview"].as_str().unwrap().chars().count(), 280);
}

#[tokio::test]
async fn replay_returns_prior_pair_without_writing() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());
  let input = NewNote {
    project_id: 7,
    body: "hello".into(),
    client_req_id: Some("same".into()),
    ..Default::default()
  };

  let first = svc.add_note(input.clone()).await.unwrap();
  store.clear_calls();
  let second = svc.add_note(input).await.unwrap();

  assert!(second.replayed);
  assert_eq!(second.record, first.record);
  assert_eq!(second.event, first.event);
  assert!(store.writes().is_empty());
  assert_eq!(store.rows("notes").len(), 1);
  assert_eq!(store.rows("events").len(), 1);
}

#[tokio::test]
async fn blank_request_ids_are_not_deduplicated() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  for _ in 0..2 {
    let out = svc
      .add_note(NewNote {
        project_id: 1,
        body: "x".into(),
        client_req_id: Some("   ".into()),
        ..Default::default()
      })
      .await
      .unwrap();
    assert!(!out.replayed);
    assert_eq!(out.record.client_req_id, None);
  }
  assert_eq!(store.rows("notes").len(), 2);
}

#[tokio::test]
async fn unauthenticated_write_touches_nothing() {
  let store = MemStore::default();
  let svc = service(store.clone());

  let err = svc
    .add_note(NewNote { project_id: 1, body: "hi".into(), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Auth));
  assert!(store.calls().is_empty());
}

#[tokio::test]
async fn blank_fields_are_rejected_before_the_guard() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let err = svc
    .add_note(NewNote {
      project_id: 1,
      body: " \n ".into(),
      client_req_id: Some("r".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let mut estimate = estimate_input(None);
  estimate.estimate_type = "  ".into();
  let err = svc.add_estimate(estimate).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  assert!(store.calls().is_empty());
}

#[tokio::test]
async fn guard_failure_propagates_without_writes() {
  let store = MemStore::as_user(Uuid::new_v4());
  store.fail_queries(true);
  let svc = service(store.clone());

  let err = svc
    .add_note(NewNote {
      project_id: 1,
      body: "x".into(),
      client_req_id: Some("r".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  assert!(store.writes().is_empty());
}

#[tokio::test]
async fn estimate_tasks_are_numbered_and_total_is_reread() {
  let user = Uuid::new_v4();
  let store = MemStore::as_user(user);
  let svc = service(store.clone());

  let out = svc.add_estimate(estimate_input(Some("est-1"))).await.unwrap();

  let orders: Vec<i64> = out.tasks.iter().map(|t| t.sort_order).collect();
  assert_eq!(orders, vec![1, 2, 3]);
  assert!(out.tasks.iter().all(|t| t.created_by == Some(user)));
  assert_eq!(out.record.status, "draft");

  // The store's trigger floors the sum (32.15); the event must carry 32.
  assert_eq!(out.record.total_amount, 32.0);
  let event = out.event.unwrap();
  assert_eq!(event.event_type, ESTIMATE_ADDED);
  assert_eq!(event.payload["total_amount"], json!(32.0));
  assert_eq!(
    event.summary,
    "Construction • Draft • 2024-03-01 • Award 2025 • $32.00"
  );

  assert_eq!(store.writes(), vec![
    "insert estimates",
    "insert estimate_tasks",
    "insert estimate_tasks",
    "insert estimate_tasks",
    "insert events",
  ]);
  // The re-read happens after the last task and before the event.
  let calls = store.calls();
  let reread = calls.iter().rposition(|c| c == "find_one estimates").unwrap();
  let event_insert = calls.iter().position(|c| c == "insert events").unwrap();
  assert!(reread < event_insert);
}

#[tokio::test]
async fn estimate_status_is_trimmed_and_kept() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store);

  let mut input = estimate_input(None);
  input.status = Some(" approved ".into());
  input.tasks.clear();
  let out = svc.add_estimate(input).await.unwrap();

  assert_eq!(out.record.status, "approved");
  assert!(out.event.unwrap().summary.starts_with("Construction • Approved • "));
}

#[tokio::test]
async fn missing_reread_falls_back_to_snapshot() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let mut input = estimate_input(None);
  input.tasks.clear();
  let snapshot = svc.add_estimate(input).await.unwrap().record;

  store.delete("estimates", "id", &json!(snapshot.id)).await.unwrap();
  let reread = crate::reconcile::reread(&store, snapshot.clone()).await.unwrap();
  assert_eq!(reread, snapshot);
}

// ─── Repair on replay ────────────────────────────────────────────────────────

#[tokio::test]
async fn replay_repairs_missing_note_event() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());
  let input = NewNote {
    project_id: 3,
    body: "half written".into(),
    client_req_id: Some("r-9".into()),
    ..Default::default()
  };

  store.fail_inserts_into(Some("events"));
  assert!(matches!(svc.add_note(input.clone()).await, Err(Error::Store(_))));
  assert_eq!(store.rows("notes").len(), 1);
  assert!(store.rows("events").is_empty());

  store.fail_inserts_into(None);
  let out = svc.add_note(input).await.unwrap();
  assert!(out.replayed);
  let event = out.event.unwrap();
  assert_eq!(event.subject_id, out.record.id);
  assert_eq!(event.client_req_id.as_deref(), Some("r-9"));
  assert_eq!(store.rows("notes").len(), 1);
  assert_eq!(store.rows("events").len(), 1);
}

#[tokio::test]
async fn replay_without_repair_reports_missing_event() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone()).with_config(ServiceConfig { repair_on_replay: false });
  let input = NewComment {
    project_id: 3,
    body: "c".into(),
    client_req_id: Some("r".into()),
    ..Default::default()
  };

  store.fail_inserts_into(Some("events"));
  assert!(svc.add_comment(input.clone()).await.is_err());
  store.fail_inserts_into(None);

  let out = svc.add_comment(input).await.unwrap();
  assert!(out.replayed);
  assert_eq!(out.event, None);
  assert!(store.rows("events").is_empty());
}

#[tokio::test]
async fn replay_repairs_partially_written_estimate() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  // Fail after the estimate row exists but before any task is written.
  store.fail_inserts_into(Some("estimate_tasks"));
  assert!(svc.add_estimate(estimate_input(Some("e"))).await.is_err());
  assert_eq!(store.rows("estimates").len(), 1);
  store.fail_inserts_into(None);

  let out = svc.add_estimate(estimate_input(Some("e"))).await.unwrap();
  assert!(out.replayed);
  let orders: Vec<i64> = out.tasks.iter().map(|t| t.sort_order).collect();
  assert_eq!(orders, vec![1, 2, 3]);
  assert_eq!(out.record.total_amount, 32.0);
  assert_eq!(out.event.unwrap().payload["total_amount"], json!(32.0));

  // A further replay is a clean hit.
  store.clear_calls();
  let again = svc.add_estimate(estimate_input(Some("e"))).await.unwrap();
  assert!(again.replayed);
  assert_eq!(again.tasks.len(), 3);
  assert!(store.writes().is_empty());
  assert_eq!(store.rows("estimate_tasks").len(), 3);
  assert_eq!(store.rows("events").len(), 1);
}

#[tokio::test]
async fn estimate_replay_without_repair_returns_stored_tasks() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone()).with_config(ServiceConfig { repair_on_replay: false });

  store.fail_inserts_into(Some("events"));
  assert!(svc.add_estimate(estimate_input(Some("e-off"))).await.is_err());
  assert_eq!(store.rows("estimate_tasks").len(), 3);
  store.fail_inserts_into(None);

  store.clear_calls();
  let out = svc.add_estimate(estimate_input(Some("e-off"))).await.unwrap();
  assert!(out.replayed);
  assert_eq!(out.event, None);
  let orders: Vec<i64> = out.tasks.iter().map(|t| t.sort_order).collect();
  assert_eq!(orders, vec![1, 2, 3]);
  assert_eq!(out.tasks[0].code, "A");
  assert!(store.writes().is_empty());
  assert!(store.rows("events").is_empty());
}

#[tokio::test]
async fn replay_repairs_missing_event_comment_event() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let parent = svc
    .add_note(NewNote { project_id: 12, body: "n".into(), ..Default::default() })
    .await
    .unwrap()
    .event
    .unwrap();
  let input = NewEventComment {
    event_id: parent.id,
    body: "retry me".into(),
    client_req_id: Some("ec-1".into()),
    ..Default::default()
  };

  store.fail_inserts_into(Some("events"));
  assert!(matches!(svc.add_event_comment(input.clone()).await, Err(Error::Store(_))));
  assert_eq!(store.rows("event_comments").len(), 1);
  store.fail_inserts_into(None);

  let out = svc.add_event_comment(input.clone()).await.unwrap();
  assert!(out.replayed);
  let event = out.event.unwrap();
  assert_eq!(event.subject_table, "event_comments");
  assert_eq!(event.subject_id, out.record.id);
  assert_eq!(event.project_id, 12);
  assert_eq!(event.payload["on_event_id"], json!(parent.id));
  assert_eq!(store.rows("event_comments").len(), 1);
  assert_eq!(store.rows("events").len(), 2);

  store.clear_calls();
  let again = svc.add_event_comment(input).await.unwrap();
  assert!(again.replayed);
  assert_eq!(again.event.map(|e| e.id), Some(event.id));
  assert!(store.writes().is_empty());
  assert_eq!(store.rows("events").len(), 2);
}

// ─── Event comments ──────────────────────────────────────────────────────────

#[tokio::test]
async fn event_comment_uses_parent_event() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let note = svc
    .add_note(NewNote { project_id: 11, body: "n".into(), ..Default::default() })
    .await
    .unwrap();
  let parent = note.event.unwrap();

  let out = svc
    .add_event_comment(NewEventComment {
      event_id: parent.id,
      body: "looks good".into(),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(out.record.event_id, parent.id);
  let event = out.event.unwrap();
  assert_eq!(event.project_id, 11);
  assert_eq!(event.event_type, COMMENT_ADDED);
  assert_eq!(event.subject_table, "event_comments");
  assert_eq!(event.payload["on_event_id"], json!(parent.id));
  assert_eq!(event.payload["on_event_type"], json!(NOTE_ADDED));
}

#[tokio::test]
async fn event_comment_on_unknown_event_is_not_found() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let err = svc
    .add_event_comment(NewEventComment { event_id: 999, body: "x".into(), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
  assert!(store.writes().is_empty());
}

#[tokio::test]
async fn reply_must_target_same_event() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let a = svc
    .add_note(NewNote { project_id: 1, body: "a".into(), ..Default::default() })
    .await
    .unwrap()
    .event
    .unwrap();
  let b = svc
    .add_note(NewNote { project_id: 1, body: "b".into(), ..Default::default() })
    .await
    .unwrap()
    .event
    .unwrap();
  let on_a = svc
    .add_event_comment(NewEventComment { event_id: a.id, body: "c".into(), ..Default::default() })
    .await
    .unwrap()
    .record;

  let err = svc
    .add_event_comment(NewEventComment {
      event_id: b.id,
      body: "reply".into(),
      parent_comment_id: Some(on_a.id),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  let reply = svc
    .add_event_comment(NewEventComment {
      event_id: a.id,
      body: "reply".into(),
      parent_comment_id: Some(on_a.id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(reply.record.parent_comment_id, Some(on_a.id));
}

// ─── Feed ────────────────────────────────────────────────────────────────────

fn seed_event(store: &MemStore, project: i64, event_type: &str, at: &str) -> i64 {
  store.seed(
    "events",
    json!({
      "project_id": project, "actor_id": Uuid::nil(), "event_type": event_type,
      "subject_table": "notes", "subject_id": 1, "summary": "", "payload": {},
      "created_at": at,
    }),
  )
}

fn seed_comment(store: &MemStore, event_id: i64, at: &str) -> i64 {
  store.seed(
    "event_comments",
    json!({
      "event_id": event_id, "author_id": Uuid::nil(), "body": "c",
      "parent_comment_id": null, "created_at": at,
    }),
  )
}

#[tokio::test]
async fn empty_feed_skips_comment_query() {
  let store = MemStore::as_user(Uuid::new_v4());
  let svc = service(store.clone());

  let events = svc.load_events(1, "feed").await.unwrap();
  assert!(events.is_empty());
  assert_eq!(store.calls(), vec!["query events"]);
}

#[tokio::test]
async fn feed_groups_comments_and_orders_newest_first() {
  let store = MemStore::as_user(Uuid::new_v4());
  let old = seed_event(&store, 1, NOTE_ADDED, "2024-01-01T00:00:00Z");
  let new = seed_event(&store, 1, ESTIMATE_ADDED, "2024-02-01T00:00:00Z");
  let tie = seed_event(&store, 1, NOTE_ADDED, "2024-02-01T00:00:00Z");
  seed_event(&store, 1, COMMENT_ADDED, "2024-03-01T00:00:00Z");
  seed_event(&store, 2, NOTE_ADDED, "2024-03-01T00:00:00Z");
  let c2 = seed_comment(&store, old, "2024-01-03T00:00:00Z");
  let c1 = seed_comment(&store, old, "2024-01-02T00:00:00Z");
  let c3 = seed_comment(&store, new, "2024-02-02T00:00:00Z");

  let svc = service(store.clone());
  let feed = svc.load_events(1, "feed").await.unwrap();

  let ids: Vec<i64> = feed.iter().map(|e| e.event.id).collect();
  assert_eq!(ids, vec![tie, new, old]);

  let comments = |id: i64| -> Vec<i64> {
    let ev = feed.iter().find(|e| e.event.id == id).unwrap();
    ev.event_comments.iter().map(|c| c.id).collect()
  };
  assert_eq!(comments(old), vec![c1, c2]);
  assert_eq!(comments(new), vec![c3]);
  assert!(comments(tie).is_empty());
  assert_eq!(store.calls(), vec!["query events", "query event_comments"]);
}

#[tokio::test]
async fn type_keys_resolve_through_registry() {
  let store = MemStore::as_user(Uuid::new_v4());
  seed_event(&store, 1, NOTE_ADDED, "2024-01-01T00:00:00Z");
  seed_event(&store, 1, ESTIMATE_ADDED, "2024-01-02T00:00:00Z");
  seed_event(&store, 1, COMMENT_ADDED, "2024-01-03T00:00:00Z");
  seed_event(&store, 1, "photo", "2024-01-04T00:00:00Z");

  let registry = EventRegistry::new(vec![
    EventTypeDef {
      key:         "notes".into(),
      label:       "Notes".into(),
      icon:        None,
      event_types: vec![NOTE_ADDED.into()],
    },
    EventTypeDef {
      key:         "photo".into(),
      label:       "Photos".into(),
      icon:        None,
      event_types: vec![],
    },
    EventTypeDef {
      key:         "discussion".into(),
      label:       "Discussion".into(),
      icon:        None,
      event_types: vec![COMMENT_ADDED.into()],
    },
  ]);
  let svc = EventService::new(store, Arc::new(registry));

  let types = |feed: Vec<projfeed_core::event::FeedEvent>| -> Vec<String> {
    feed.into_iter().map(|e| e.event.event_type).collect()
  };
  assert_eq!(types(svc.load_events(1, "notes").await.unwrap()), vec![NOTE_ADDED]);
  assert_eq!(types(svc.load_events(1, "photo").await.unwrap()), vec!["photo"]);
  assert_eq!(types(svc.load_events(1, "discussion").await.unwrap()), vec![COMMENT_ADDED]);
  assert_eq!(types(svc.load_events(1, "feed").await.unwrap()), vec![
    "photo",
    ESTIMATE_ADDED,
    NOTE_ADDED
  ]);

  let err = svc.load_events(1, "nonsense").await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

// ─── Inflation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn inflation_loads_once_until_invalidated() {
  let store = MemStore::default();
  store.seed("inflators", json!({ "year": 2020, "inflation_index": 1.0 }));
  store.seed("inflators", json!({ "year": 2021, "inflation_index": 1.1 }));
  let svc = InflationService::new(store.clone());

  let (a, b) = tokio::join!(svc.inflate(100.0, 2020, 2021), svc.inflate(50.0, 2020, 2020));
  assert_eq!(a, 110.0);
  assert_eq!(b, 50.0);
  assert_eq!(svc.inflate(10.0, 2021, 2020).await, 9.09);
  assert_eq!(store.calls(), vec!["query inflators"]);

  svc.invalidate();
  assert_eq!(svc.phase(), projfeed_core::cache::Phase::Empty);
  svc.index().await;
  assert_eq!(store.calls().len(), 2);
}

#[tokio::test]
async fn inflation_load_failure_is_not_cached() {
  let store = MemStore::default();
  store.seed("inflators", json!({ "year": 2020, "inflation_index": 1.0 }));
  store.seed("inflators", json!({ "year": 2021, "inflation_index": 2.0 }));
  let svc = InflationService::new(store.clone());

  store.fail_queries(true);
  assert!(svc.index().await.is_empty());
  assert_eq!(svc.inflate(5.0, 2020, 2021).await, 5.0);

  store.fail_queries(false);
  assert_eq!(svc.inflate(5.0, 2020, 2021).await, 10.0);
}

// ─── SQLite end to end ───────────────────────────────────────────────────────

async fn sqlite_service() -> (EventService<SqliteStore>, Uuid) {
  let user = Uuid::new_v4();
  let store = SqliteStore::open_in_memory().await.unwrap().scoped_to(user);
  (EventService::new(store, Arc::new(EventRegistry::default())), user)
}

#[tokio::test]
async fn sqlite_add_note_scenario() {
  let (svc, user) = sqlite_service().await;

  let out = svc
    .add_note(NewNote {
      project_id: 42,
      body: "First   note\non the project".into(),
      client_req_id: Some("note-1".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  let event = out.event.clone().unwrap();
  assert_eq!(event.actor_id, user);
  assert_eq!(event.summary, "First note on the project");

  let again = svc
    .add_note(NewNote {
      project_id: 42,
      body: "First   note\non the project".into(),
      client_req_id: Some("note-1".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(again.replayed);
  assert_eq!(again.record, out.record);
  assert_eq!(again.event, out.event);

  let feed = svc.load_events(42, "feed").await.unwrap();
  assert_eq!(feed.len(), 1);
  assert_eq!(feed[0].event, event);
  assert!(feed[0].event_comments.is_empty());

  let notes = svc.load_events(42, "notes").await.unwrap();
  assert_eq!(notes.len(), 1);
}

#[tokio::test]
async fn sqlite_estimate_total_comes_from_trigger() {
  let (svc, _) = sqlite_service().await;

  let out = svc.add_estimate(estimate_input(Some("e-1"))).await.unwrap();
  assert_eq!(out.record.total_amount, 32.15);
  let event = out.event.unwrap();
  assert_eq!(event.payload["total_amount"], json!(32.15));
  assert!(event.summary.ends_with("$32.15"));

  let tasks = svc.load_estimate_tasks(out.record.id).await.unwrap();
  let codes: Vec<&str> = tasks.iter().map(|t| t.code.as_str()).collect();
  assert_eq!(codes, vec!["A", "B", "C"]);

  let again = svc.add_estimate(estimate_input(Some("e-1"))).await.unwrap();
  assert!(again.replayed);
  assert_eq!(again.tasks, tasks);
}

#[tokio::test]
async fn sqlite_event_comments_join_the_feed() {
  let (svc, _) = sqlite_service().await;

  let parent = svc
    .add_note(NewNote { project_id: 5, body: "n".into(), ..Default::default() })
    .await
    .unwrap()
    .event
    .unwrap();
  let first = svc
    .add_event_comment(NewEventComment { event_id: parent.id, body: "one".into(), ..Default::default() })
    .await
    .unwrap();
  svc
    .add_event_comment(NewEventComment {
      event_id: parent.id,
      body: "two".into(),
      parent_comment_id: Some(first.record.id),
      ..Default::default()
    })
    .await
    .unwrap();

  let feed = svc.load_events(5, "feed").await.unwrap();
  assert_eq!(feed.len(), 1, "comment.added events stay out of the feed");
  let bodies: Vec<&str> = feed[0].event_comments.iter().map(|c| c.body.as_str()).collect();
  assert_eq!(bodies, vec!["one", "two"]);
}
