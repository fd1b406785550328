//! The event recorder: idempotent domain writes paired with feed events.

use std::collections::HashSet;

use projfeed_core::{
  event::{Event, EventKind, NewEvent},
  record::{
    Comment, Estimate, EstimateTask, EventComment, NewComment, NewEstimate,
    NewEventComment, NewNote, NewTask, Note, Record,
  },
  store::{DataStore, Row, row},
  summary::{EstimateFacts, estimate_summary, preview, summarize},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  Error, EventService, Recorded, Result,
  guard::{self, Prior},
  normalize_req_id, reconcile, require,
};

/// Status given to estimates submitted without one.
pub const DEFAULT_STATUS: &str = "draft";

impl<S: DataStore> EventService<S> {
  /// Add a note to a project.
  #[tracing::instrument(skip_all, fields(project_id = input.project_id))]
  pub async fn add_note(&self, input: NewNote) -> Result<Recorded<Note>> {
    let actor = self.actor().await?;
    require("body", &input.body)?;
    let req_id = normalize_req_id(input.client_req_id);

    if let Some(prior) = guard::find_prior::<S, Note>(&self.store, req_id.as_deref()).await? {
      return self.settle(prior, note_event).await;
    }

    let note: Note = self
      .insert(row(json!({
        "project_id":     input.project_id,
        "author_id":      actor,
        "body":           input.body,
        "parent_note_id": input.parent_note_id,
        "client_req_id":  req_id,
      })))
      .await?;
    let event = self.record_event(note_event(&note)).await?;

    tracing::info!(note_id = note.id, event_id = event.id, "note added");
    Ok(Recorded::fresh(note, event, Vec::new()))
  }

  /// Add a top-level comment to a project.
  #[tracing::instrument(skip_all, fields(project_id = input.project_id))]
  pub async fn add_comment(&self, input: NewComment) -> Result<Recorded<Comment>> {
    let actor = self.actor().await?;
    require("body", &input.body)?;
    let req_id = normalize_req_id(input.client_req_id);

    if let Some(prior) = guard::find_prior::<S, Comment>(&self.store, req_id.as_deref()).await? {
      return self.settle(prior, comment_event).await;
    }

    let comment: Comment = self
      .insert(row(json!({
        "project_id":        input.project_id,
        "author_id":         actor,
        "body":              input.body,
        "parent_comment_id": input.parent_comment_id,
        "client_req_id":     req_id,
      })))
      .await?;
    let event = self.record_event(comment_event(&comment)).await?;

    tracing::info!(comment_id = comment.id, event_id = event.id, "comment added");
    Ok(Recorded::fresh(comment, event, Vec::new()))
  }

  /// Comment on an existing event, optionally replying to another comment on
  /// the same event.
  #[tracing::instrument(skip_all, fields(event_id = input.event_id))]
  pub async fn add_event_comment(
    &self,
    input: NewEventComment,
  ) -> Result<Recorded<EventComment>> {
    let actor = self.actor().await?;
    require("body", &input.body)?;
    let req_id = normalize_req_id(input.client_req_id);

    if let Some(prior) =
      guard::find_prior::<S, EventComment>(&self.store, req_id.as_deref()).await?
    {
      if prior.event.is_some() || !self.config.repair_on_replay {
        return Ok(Recorded::replay(prior.record, prior.event, Vec::new()));
      }
      let parent = self.parent_event(prior.record.event_id).await?;
      return self.settle(prior, |c| event_comment_event(c, &parent)).await;
    }

    let parent = self.parent_event(input.event_id).await?;
    if let Some(reply_to) = input.parent_comment_id {
      self.check_reply_target(input.event_id, reply_to).await?;
    }

    let comment: EventComment = self
      .insert(row(json!({
        "event_id":          input.event_id,
        "author_id":         actor,
        "body":              input.body,
        "parent_comment_id": input.parent_comment_id,
        "client_req_id":     req_id,
      })))
      .await?;
    let event = self.record_event(event_comment_event(&comment, &parent)).await?;

    tracing::info!(comment_id = comment.id, event_id = event.id, "event comment added");
    Ok(Recorded::fresh(comment, event, Vec::new()))
  }

  /// Add an estimate with its line items. The event is written after the
  /// store has recomputed the estimate's total.
  #[tracing::instrument(
    skip_all,
    fields(project_id = input.project_id, tasks = input.tasks.len())
  )]
  pub async fn add_estimate(&self, input: NewEstimate) -> Result<Recorded<Estimate>> {
    let actor = self.actor().await?;
    require("estimate_type", &input.estimate_type)?;
    let req_id = normalize_req_id(input.client_req_id);

    if let Some(prior) = guard::find_prior::<S, Estimate>(&self.store, req_id.as_deref()).await? {
      return self.settle_estimate(prior, &input.tasks, actor).await;
    }

    let status = input
      .status
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .unwrap_or(DEFAULT_STATUS);

    let estimate: Estimate = self
      .insert(row(json!({
        "project_id":          input.project_id,
        "author_id":           actor,
        "status":              status,
        "estimate_type":       input.estimate_type,
        "estimate_date":       input.estimate_date,
        "estimate_award_year": input.estimate_award_year,
        "total_amount":        0,
        "client_req_id":       req_id,
      })))
      .await?;

    let numbered = input.tasks.iter().zip(1..).map(|(t, n)| (n, t)).collect();
    let tasks = self.insert_tasks(estimate.id, actor, numbered).await?;

    let estimate = reconcile::reread(&self.store, estimate).await?;
    let event = self.record_event(estimate_event(&estimate)).await?;

    tracing::info!(
      estimate_id = estimate.id,
      event_id = event.id,
      total = estimate.total_amount,
      "estimate added"
    );
    Ok(Recorded::fresh(estimate, event, tasks))
  }

  // ─── Replay ────────────────────────────────────────────────────────────────

  /// Turn a guard hit into a result, writing the missing event when repair
  /// is enabled.
  async fn settle<R, F>(&self, prior: Prior<R>, build: F) -> Result<Recorded<R>>
  where
    R: Record,
    F: FnOnce(&R) -> NewEvent + Send,
  {
    let Prior { record, event } = prior;
    match event {
      Some(event) => Ok(Recorded::replay(record, Some(event), Vec::new())),
      None if self.config.repair_on_replay => {
        let event = self.record_event(build(&record)).await?;
        tracing::warn!(table = R::TABLE, id = record.id(), "repaired missing event");
        Ok(Recorded::replay(record, Some(event), Vec::new()))
      }
      None => Ok(Recorded::replay(record, None, Vec::new())),
    }
  }

  /// Estimate variant of [`settle`](Self::settle): repair also inserts any
  /// requested tasks whose `sort_order` is not yet stored, then re-reads the
  /// total before writing the event.
  async fn settle_estimate(
    &self,
    prior: Prior<Estimate>,
    requested: &[NewTask],
    actor: Uuid,
  ) -> Result<Recorded<Estimate>> {
    let Prior { record, event } = prior;
    let mut tasks = self.load_estimate_tasks(record.id).await?;

    if event.is_some() || !self.config.repair_on_replay {
      return Ok(Recorded::replay(record, event, tasks));
    }

    let present: HashSet<i64> = tasks.iter().map(|t| t.sort_order).collect();
    let missing: Vec<(i64, &NewTask)> = requested
      .iter()
      .zip(1..)
      .map(|(t, n)| (n, t))
      .filter(|(n, _)| !present.contains(n))
      .collect();
    if !missing.is_empty() {
      tasks.extend(self.insert_tasks(record.id, actor, missing).await?);
      tasks.sort_by_key(|t| t.sort_order);
    }

    let estimate = reconcile::reread(&self.store, record).await?;
    let event = self.record_event(estimate_event(&estimate)).await?;
    tracing::warn!(estimate_id = estimate.id, "repaired missing estimate event");
    Ok(Recorded::replay(estimate, Some(event), tasks))
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  async fn insert<R: Record>(&self, row: Row) -> Result<R> {
    let row = self.store.insert(R::TABLE, row).await.map_err(Error::store)?;
    Ok(R::from_row(row)?)
  }

  async fn record_event(&self, event: NewEvent) -> Result<Event> {
    self.insert(event.to_row()).await
  }

  /// Insert tasks one at a time, in the given order.
  async fn insert_tasks(
    &self,
    estimate_id: i64,
    actor: Uuid,
    tasks: Vec<(i64, &NewTask)>,
  ) -> Result<Vec<EstimateTask>> {
    let mut inserted = Vec::with_capacity(tasks.len());
    for (sort_order, task) in tasks {
      tracing::debug!(estimate_id, sort_order, "inserting task");
      let task: EstimateTask = self
        .insert(row(json!({
          "estimate_id": estimate_id,
          "sort_order":  sort_order,
          "code":        task.code,
          "description": task.description,
          "amount":      task.amount,
          "created_by":  actor,
        })))
        .await?;
      inserted.push(task);
    }
    Ok(inserted)
  }

  async fn parent_event(&self, event_id: i64) -> Result<Event> {
    let row = self
      .store
      .find_one(Event::TABLE, "id", &Value::from(event_id), None)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("event {event_id}")))?;
    Ok(Event::from_row(row)?)
  }

  /// A reply must target an existing comment on the same event.
  async fn check_reply_target(&self, event_id: i64, comment_id: i64) -> Result<()> {
    let row = self
      .store
      .find_one(EventComment::TABLE, "id", &Value::from(comment_id), None)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("comment {comment_id}")))?;

    let parent = EventComment::from_row(row)?;
    if parent.event_id != event_id {
      return Err(Error::Validation(format!(
        "comment {comment_id} belongs to event {}, not {event_id}",
        parent.event_id
      )));
    }
    Ok(())
  }
}

// ─── Event builders ──────────────────────────────────────────────────────────

fn note_event(note: &Note) -> NewEvent {
  NewEvent {
    project_id:    note.project_id,
    actor_id:      note.author_id,
    kind:          EventKind::NoteAdded,
    subject_table: Note::TABLE,
    subject_id:    note.id,
    summary:       summarize(&note.body),
    payload:       json!({
      "body_preview":   preview(&note.body),
      "parent_note_id": note.parent_note_id,
    }),
    client_req_id: note.client_req_id.clone(),
  }
}

fn comment_event(comment: &Comment) -> NewEvent {
  NewEvent {
    project_id:    comment.project_id,
    actor_id:      comment.author_id,
    kind:          EventKind::CommentAdded,
    subject_table: Comment::TABLE,
    subject_id:    comment.id,
    summary:       summarize(&comment.body),
    payload:       json!({
      "body_preview":      preview(&comment.body),
      "parent_comment_id": comment.parent_comment_id,
    }),
    client_req_id: comment.client_req_id.clone(),
  }
}

fn event_comment_event(comment: &EventComment, on: &Event) -> NewEvent {
  NewEvent {
    project_id:    on.project_id,
    actor_id:      comment.author_id,
    kind:          EventKind::CommentAdded,
    subject_table: EventComment::TABLE,
    subject_id:    comment.id,
    summary:       summarize(&comment.body),
    payload:       json!({
      "body_preview":      preview(&comment.body),
      "parent_comment_id": comment.parent_comment_id,
      "on_event_id":       on.id,
      "on_event_type":     on.event_type,
    }),
    client_req_id: comment.client_req_id.clone(),
  }
}

fn estimate_event(estimate: &Estimate) -> NewEvent {
  let summary = estimate_summary(&EstimateFacts {
    estimate_type:       &estimate.estimate_type,
    status:              &estimate.status,
    estimate_date:       estimate.estimate_date,
    estimate_award_year: estimate.estimate_award_year,
    total_amount:        estimate.total_amount,
  });

  NewEvent {
    project_id: estimate.project_id,
    actor_id: estimate.author_id,
    kind: EventKind::EstimateAdded,
    subject_table: Estimate::TABLE,
    subject_id: estimate.id,
    summary,
    payload: json!({
      "status":              estimate.status,
      "estimate_type":       estimate.estimate_type,
      "estimate_date":       estimate.estimate_date,
      "estimate_award_year": estimate.estimate_award_year,
      "total_amount":        estimate.total_amount,
    }),
    client_req_id: estimate.client_req_id.clone(),
  }
}
