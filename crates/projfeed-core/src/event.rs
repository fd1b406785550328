//! Events — the append-only audit/feed rows written alongside every domain
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::record::{EventComment, Record};

pub const NOTE_ADDED: &str = "note.added";
pub const COMMENT_ADDED: &str = "comment.added";
pub const ESTIMATE_ADDED: &str = "estimate.added";

/// Maximum length of [`Event::summary`], in characters.
pub const SUMMARY_MAX: usize = 140;

/// Maximum length of the `body_preview` payload field, in characters.
pub const PREVIEW_MAX: usize = 280;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The kind of an event, parsed from its `event_type` string.
///
/// The set of event types is configured externally, so unrecognised strings
/// are kept as [`EventKind::Other`] rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
  NoteAdded,
  CommentAdded,
  EstimateAdded,
  Other(String),
}

impl EventKind {
  pub fn parse(event_type: &str) -> Self {
    match event_type {
      NOTE_ADDED => Self::NoteAdded,
      COMMENT_ADDED => Self::CommentAdded,
      ESTIMATE_ADDED => Self::EstimateAdded,
      other => Self::Other(other.to_owned()),
    }
  }

  /// The string stored in the `event_type` column.
  pub fn as_str(&self) -> &str {
    match self {
      Self::NoteAdded => NOTE_ADDED,
      Self::CommentAdded => COMMENT_ADDED,
      Self::EstimateAdded => ESTIMATE_ADDED,
      Self::Other(s) => s,
    }
  }
}

impl std::fmt::Display for EventKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A persisted event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id:            i64,
  pub project_id:    i64,
  pub actor_id:      Uuid,
  pub event_type:    String,
  /// Table of the record this event describes. Together with `subject_id`
  /// this is a lookup relation only, not ownership.
  pub subject_table: String,
  pub subject_id:    i64,
  /// Whitespace-collapsed, trimmed, at most [`SUMMARY_MAX`] characters.
  pub summary:       String,
  /// Snapshot of the record at write time.
  pub payload:       Value,
  #[serde(default)]
  pub client_req_id: Option<String>,
  pub created_at:    DateTime<Utc>,
}

impl Event {
  pub fn kind(&self) -> EventKind { EventKind::parse(&self.event_type) }

  /// A string field of the payload, if present and non-empty.
  pub fn payload_str(&self, key: &str) -> Option<&str> {
    self
      .payload
      .get(key)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }
}

impl Record for Event {
  const TABLE: &'static str = "events";

  fn id(&self) -> i64 { self.id }
}

/// Input for an event insert. `id` and `created_at` are set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
  pub project_id:    i64,
  pub actor_id:      Uuid,
  pub kind:          EventKind,
  pub subject_table: &'static str,
  pub subject_id:    i64,
  pub summary:       String,
  pub payload:       Value,
  pub client_req_id: Option<String>,
}

impl NewEvent {
  pub fn to_row(&self) -> crate::store::Row {
    crate::store::row(serde_json::json!({
      "project_id":    self.project_id,
      "actor_id":      self.actor_id,
      "event_type":    self.kind.as_str(),
      "subject_table": self.subject_table,
      "subject_id":    self.subject_id,
      "summary":       self.summary,
      "payload":       self.payload,
      "client_req_id": self.client_req_id,
    }))
  }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// An event enriched with every comment attached to it, flat and in query
/// order. Events without comments carry an empty vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
  #[serde(flatten)]
  pub event:          Event,
  pub event_comments: Vec<EventComment>,
}
