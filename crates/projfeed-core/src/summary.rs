//! Summarizers that derive the short, human-readable `summary` column of an
//! event from the record it describes.

use chrono::NaiveDate;

use crate::event::{PREVIEW_MAX, SUMMARY_MAX};

/// Collapse every whitespace run to a single space, trim, and cap the result
/// at [`SUMMARY_MAX`] characters. A byte-order mark counts as whitespace.
pub fn summarize(text: &str) -> String {
  let collapsed = text
    .split(|c: char| c.is_whitespace() || c == '\u{FEFF}')
    .filter(|word| !word.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
  cap(&collapsed, SUMMARY_MAX).trim_end().to_owned()
}

/// The first [`PREVIEW_MAX`] characters of `body`, verbatim.
pub fn preview(body: &str) -> &str { cap(body, PREVIEW_MAX) }

/// The longest prefix of `s` holding at most `max` characters.
fn cap(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Format `amount` as US dollars, e.g. `$1,234.50` or `-$12.00`.
pub fn format_currency(amount: f64) -> String {
  let cents = (amount * 100.0).round();
  let negative = cents < 0.0;
  let cents = cents.abs() as u64;
  let dollars = (cents / 100).to_string();

  let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
  for (i, ch) in dollars.chars().enumerate() {
    if i > 0 && (dollars.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(ch);
  }

  let sign = if negative { "-" } else { "" };
  format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Upper-case the first character; an empty status reads as `Draft`.
fn initcap(status: &str) -> String {
  let mut chars = status.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => "Draft".to_owned(),
  }
}

// ─── Estimates ───────────────────────────────────────────────────────────────

/// The key facts of an estimate that go into its event summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateFacts<'a> {
  pub estimate_type:       &'a str,
  pub status:              &'a str,
  pub estimate_date:       Option<NaiveDate>,
  pub estimate_award_year: Option<i32>,
  pub total_amount:        f64,
}

/// `type • Status • date • Award <year> • $total`, empty parts dropped,
/// capped at [`SUMMARY_MAX`] characters.
pub fn estimate_summary(facts: &EstimateFacts<'_>) -> String {
  let mut parts = vec![
    facts.estimate_type.trim().to_owned(),
    initcap(facts.status.trim()),
    facts
      .estimate_date
      .map(|d| d.format("%Y-%m-%d").to_string())
      .unwrap_or_default(),
  ];
  if let Some(year) = facts.estimate_award_year {
    parts.push(format!("Award {year}"));
  }
  parts.push(format_currency(facts.total_amount));

  let joined = parts
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(" • ");
  summarize(&joined)
}
