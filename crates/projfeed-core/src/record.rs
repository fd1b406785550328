//! Domain records — the primary rows written by user actions.
//!
//! Records are immutable once created. Each successful write is paired with
//! exactly one [`Event`](crate::event::Event) whose `subject_table` and
//! `subject_id` point back at the record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{Result, store::Row};

// ─── Record trait ────────────────────────────────────────────────────────────

/// A typed view over a row of a specific table.
pub trait Record: DeserializeOwned + Send + Sync + 'static {
  /// The table this record lives in.
  const TABLE: &'static str;

  /// Store-generated primary key.
  fn id(&self) -> i64;

  /// Decode a row returned by a [`DataStore`](crate::store::DataStore).
  /// Columns the record does not know about are ignored.
  fn from_row(row: Row) -> Result<Self> {
    Ok(serde_json::from_value(Value::Object(row))?)
  }
}

macro_rules! record {
  ($ty:ty, $table:literal) => {
    impl Record for $ty {
      const TABLE: &'static str = $table;

      fn id(&self) -> i64 { self.id }
    }
  };
}

// ─── Notes and comments ──────────────────────────────────────────────────────

/// A free-text note on a project, optionally replying to another note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub id:             i64,
  pub project_id:     i64,
  pub author_id:      Uuid,
  /// Stored verbatim; never normalised.
  pub body:           String,
  pub parent_note_id: Option<i64>,
  pub client_req_id:  Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// A top-level project comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id:                i64,
  pub project_id:        i64,
  pub author_id:         Uuid,
  pub body:              String,
  pub parent_comment_id: Option<i64>,
  pub client_req_id:     Option<String>,
  pub created_at:        DateTime<Utc>,
}

/// A comment attached to an event. Comments on one event form a tree via
/// `parent_comment_id`; a parent always exists before its replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventComment {
  pub id:                i64,
  pub event_id:          i64,
  pub author_id:         Uuid,
  pub body:              String,
  pub parent_comment_id: Option<i64>,
  #[serde(default)]
  pub client_req_id:     Option<String>,
  pub created_at:        DateTime<Utc>,
}

// ─── Estimates ───────────────────────────────────────────────────────────────

/// A cost estimate. `total_amount` is maintained by the store whenever the
/// estimate's tasks change and is never computed client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
  pub id:                  i64,
  pub project_id:          i64,
  pub author_id:           Uuid,
  pub status:              String,
  pub estimate_type:       String,
  pub estimate_date:       Option<NaiveDate>,
  pub estimate_award_year: Option<i32>,
  pub total_amount:        f64,
  pub client_req_id:       Option<String>,
  pub created_at:          DateTime<Utc>,
}

/// An ordered line item of an [`Estimate`]. `sort_order` starts at 1 and is
/// unique within the estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateTask {
  pub id:          i64,
  pub estimate_id: i64,
  pub sort_order:  i64,
  pub code:        String,
  pub description: String,
  pub amount:      f64,
  #[serde(default)]
  pub created_by:  Option<Uuid>,
  #[serde(default)]
  pub created_at:  Option<DateTime<Utc>>,
}

record!(Note, "notes");
record!(Comment, "comments");
record!(EventComment, "event_comments");
record!(Estimate, "estimates");
record!(EstimateTask, "estimate_tasks");

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to `EventService::add_note`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNote {
  pub project_id:     i64,
  pub body:           String,
  #[serde(default)]
  pub parent_note_id: Option<i64>,
  /// Caller-generated idempotency key, scoped to the `notes` table.
  #[serde(default)]
  pub client_req_id:  Option<String>,
}

/// Input to `EventService::add_comment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewComment {
  pub project_id:        i64,
  pub body:              String,
  #[serde(default)]
  pub parent_comment_id: Option<i64>,
  #[serde(default)]
  pub client_req_id:     Option<String>,
}

/// Input to `EventService::add_event_comment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEventComment {
  pub event_id:          i64,
  pub body:              String,
  #[serde(default)]
  pub parent_comment_id: Option<i64>,
  #[serde(default)]
  pub client_req_id:     Option<String>,
}

/// One line item of a [`NewEstimate`], in display order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewTask {
  pub code:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub amount:      f64,
}

/// Input to `EventService::add_estimate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEstimate {
  pub project_id:          i64,
  pub estimate_type:       String,
  /// Blank or absent means `draft`.
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
