//! Plain-text title and body rendering for feed events.
//!
//! Renderers are chosen through an explicit table keyed by event type.
//! Event types without an entry use the default renderers, since the set of
//! types is configured outside the code.

use crate::{
  event::{ESTIMATE_ADDED, Event, EventKind, NOTE_ADDED},
  registry::EventRegistry,
  summary::format_currency,
};

/// The title and body renderers for one event kind.
#[derive(Clone, Copy)]
pub struct Renderers {
  pub title: fn(&Event) -> String,
  pub body:  fn(&Event) -> String,
}

const DEFAULT: Renderers = Renderers { title: default_title, body: default_body };

const RENDERERS: &[(&str, Renderers)] = &[
  (NOTE_ADDED, Renderers { title: note_title, body: note_body }),
  (ESTIMATE_ADDED, Renderers { title: estimate_title, body: estimate_body }),
];

/// Look up the renderers for `kind`, falling back to the defaults.
pub fn renderers_for(kind: &EventKind) -> Renderers {
  RENDERERS
    .iter()
    .find(|(event_type, _)| *event_type == kind.as_str())
    .map(|(_, r)| *r)
    .unwrap_or(DEFAULT)
}

pub fn title(event: &Event) -> String { (renderers_for(&event.kind()).title)(event) }

pub fn body(event: &Event) -> String { (renderers_for(&event.kind()).body)(event) }

/// The icon configured for the event's type, or the default icon.
pub fn icon<'a>(registry: &'a EventRegistry, event: &Event) -> &'a str {
  registry.icon_for(&event.event_type)
}

// ─── Notes ───────────────────────────────────────────────────────────────────

fn note_title(_: &Event) -> String { "Note".to_owned() }

fn note_body(event: &Event) -> String {
  event
    .payload_str("body_preview")
    .unwrap_or(&event.summary)
    .to_owned()
}

// ─── Estimates ───────────────────────────────────────────────────────────────

fn estimate_title(event: &Event) -> String {
  let date = event.payload_str("estimate_date").map(|d| d.get(..10).unwrap_or(d));
  let parts: Vec<&str> = [
    event.payload_str("status"),
    event.payload_str("estimate_type"),
    date,
  ]
  .into_iter()
  .flatten()
  .collect();

  if parts.is_empty() {
    "Estimate".to_owned()
  } else {
    parts.join(" · ")
  }
}

fn estimate_body(event: &Event) -> String {
  let field = |key| event.payload_str(key).unwrap_or("—");
  let mut parts = vec![
    format!("Type {}", field("estimate_type")),
    format!("Status {}", field("status")),
    format!("Date {}", field("estimate_date")),
  ];
  if let Some(year) = event.payload.get("estimate_award_year").and_then(|v| v.as_i64()) {
    parts.push(format!("Award {year}"));
  }
  let total = event
    .payload
    .get("total_amount")
    .and_then(|v| v.as_f64())
    .unwrap_or(0.0);
  parts.push(format!("Total {}", format_currency(total)));
  parts.join(" · ")
}

// ─── Default ─────────────────────────────────────────────────────────────────

fn default_title(event: &Event) -> String {
  [
    Some(event.summary.as_str()).filter(|s| !s.is_empty()),
    event.payload_str("title"),
    event.payload_str("filename"),
  ]
  .into_iter()
  .flatten()
  .next()
  .unwrap_or(&event.event_type)
  .to_owned()
}

fn default_body(event: &Event) -> String {
  let summary = event.summary.as_str();
  match event.payload_str("body_preview") {
    Some(details) if details != summary && !summary.is_empty() => {
      format!("{summary}\n{details}")
    }
    Some(details) if summary.is_empty() => details.to_owned(),
    _ => summary.to_owned(),
  }
}
