//! The event-type registry: navigational keys mapped to the underlying
//! event-type strings they select.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, event::COMMENT_ADDED};

/// The synthetic key for the "all events" feed view.
pub const FEED_KEY: &str = "feed";

/// Icon used when no registry entry claims an event type.
pub const DEFAULT_ICON: &str = "circle";

/// One navigational entry, e.g. "Estimates".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeDef {
  pub key:         String,
  pub label:       String,
  #[serde(default)]
  pub icon:        Option<String>,
  /// Underlying event types. Empty means the key itself is the event type.
  #[serde(default)]
  pub event_types: Vec<String>,
}

impl EventTypeDef {
  fn new(key: &str, label: &str, icon: &str, event_types: &[&str]) -> Self {
    Self {
      key:         key.to_owned(),
      label:       label.to_owned(),
      icon:        Some(icon.to_owned()),
      event_types: event_types.iter().map(|s| (*s).to_owned()).collect(),
    }
  }

  /// The event types this entry selects.
  pub fn resolved_types(&self) -> Vec<String> {
    if self.event_types.is_empty() {
      vec![self.key.clone()]
    } else {
      self.event_types.clone()
    }
  }

  fn claims(&self, event_type: &str) -> bool {
    self.key == event_type || self.event_types.iter().any(|t| t == event_type)
  }
}

/// Which events a feed request selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  /// Every event type except [`COMMENT_ADDED`].
  Feed,
  /// Exactly these event types.
  Types(Vec<String>),
}

impl Selection {
  /// The event type excluded by the synthetic feed view.
  pub const FEED_EXCLUDES: &'static str = COMMENT_ADDED;
}

/// Ordered set of [`EventTypeDef`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRegistry {
  defs: Vec<EventTypeDef>,
}

impl Default for EventRegistry {
  fn default() -> Self {
    Self::new(vec![
      EventTypeDef::new("documents", "Documents", "file-earmark-text", &[
        "document.added",
        "document.updated",
        "document.deleted",
      ]),
      EventTypeDef::new("estimates", "Estimates", "calculator", &[
        "estimate.added",
        "estimate.revised",
        "estimate.approved",
      ]),
      EventTypeDef::new("notes", "Notes", "sticky", &[
        "note.added",
        "note.edited",
        "note.deleted",
      ]),
    ])
  }
}

impl EventRegistry {
  pub fn new(defs: Vec<EventTypeDef>) -> Self { Self { defs } }

  pub fn defs(&self) -> &[EventTypeDef] { &self.defs }

  pub fn get(&self, key: &str) -> Option<&EventTypeDef> {
    self.defs.iter().find(|d| d.key == key)
  }

  /// Resolve a navigational key. Unknown keys are a configuration error.
  pub fn resolve(&self, key: &str) -> Result<Selection> {
    if key == FEED_KEY {
      return Ok(Selection::Feed);
    }
    self
      .get(key)
      .map(|def| Selection::Types(def.resolved_types()))
      .ok_or_else(|| Error::UnknownEventType(key.to_owned()))
  }

  /// The icon of the first entry claiming `event_type`.
  pub fn icon_for(&self, event_type: &str) -> &str {
    self
      .defs
      .iter()
      .find(|d| d.claims(event_type))
      .and_then(|d| d.icon.as_deref())
      .unwrap_or(DEFAULT_ICON)
  }
}
