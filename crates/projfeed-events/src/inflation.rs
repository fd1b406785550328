//! Year-over-year inflation adjustment backed by the `inflators` table.
//!
//! The table is read once and cached process-wide in a [`SingleFlight`];
//! concurrent first callers share one load.

use std::{collections::BTreeMap, sync::Arc};

use projfeed_core::{
  cache::{Phase, SingleFlight},
  store::{DataStore, Order, Query, Row},
};
use serde::Serialize;

use crate::{Error, Result};

pub const INFLATORS_TABLE: &str = "inflators";

// ─── Index ───────────────────────────────────────────────────────────────────

/// Inflation index per year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InflationIndex {
  by_year: BTreeMap<i32, f64>,
}

impl InflationIndex {
  /// Build an index from `inflators` rows. Rows whose year or index is
  /// missing or not a finite number are dropped; a later row for the same
  /// year wins.
  pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
    let by_year = rows
      .into_iter()
      .filter_map(|row| {
        let year = number(row.get("year")?)?;
        let index = number(row.get("inflation_index")?)?;
        let year = i32::try_from(year as i64).ok().filter(|_| year.fract() == 0.0)?;
        Some((year, index))
      })
      .collect();
    Self { by_year }
  }

  pub fn get(&self, year: i32) -> Option<f64> { self.by_year.get(&year).copied() }

  pub fn len(&self) -> usize { self.by_year.len() }

  pub fn is_empty(&self) -> bool { self.by_year.is_empty() }

  /// Convert `value` from `from` dollars to `to` dollars.
  ///
  /// The value is returned unchanged when the years are equal or either year
  /// has no (non-zero) index. Otherwise the result is rounded to cents.
  pub fn inflate(&self, value: f64, from: i32, to: i32) -> f64 {
    if from == to {
      return value;
    }
    match (self.get(from), self.get(to)) {
      (Some(base), Some(target)) if base != 0.0 => {
        ((value * target / base) * 100.0).round() / 100.0
      }
      _ => value,
    }
  }
}

/// A finite number from a JSON number or numeric string.
fn number(value: &serde_json::Value) -> Option<f64> {
  let n = match value {
    serde_json::Value::Number(n) => n.as_f64()?,
    serde_json::Value::String(s) => s.trim().parse().ok()?,
    _ => return None,
  };
  n.is_finite().then_some(n)
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Cached access to the [`InflationIndex`].
pub struct InflationService<S> {
  store: S,
  cache: Arc<SingleFlight<InflationIndex, Error>>,
}

impl<S: Clone> Clone for InflationService<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), cache: Arc::clone(&self.cache) }
  }
}

impl<S> InflationService<S>
where
  S: DataStore + Clone + 'static,
{
  pub fn new(store: S) -> Self {
    Self { store, cache: Arc::new(SingleFlight::new()) }
  }

  /// The cached index, loading it on first use.
  ///
  /// A failed load is logged and yields an empty index; nothing is cached,
  /// so the next call tries again.
  pub async fn index(&self) -> Arc<InflationIndex> {
    let store = self.store.clone();
    match self.cache.get_or_load(move || async move { load(&store).await }).await {
      Ok(index) => index,
      Err(err) => {
        tracing::error!(error = %err, "failed to load inflators");
        Arc::new(InflationIndex::default())
      }
    }
  }

  pub async fn inflate(&self, value: f64, from: i32, to: i32) -> f64 {
    self.index().await.inflate(value, from, to)
  }

  /// Drop the cached index; the next call reloads it.
  pub fn invalidate(&self) {
    tracing::info!("inflation index invalidated");
    self.cache.invalidate();
  }

  pub fn phase(&self) -> Phase { self.cache.phase() }
}

async fn load<S: DataStore>(store: &S) -> Result<InflationIndex> {
  let query = Query::all()
    .select("year, inflation_index")
    .order(Order::asc("year"));
  let page = store.query(INFLATORS_TABLE, &query).await.map_err(Error::store)?;

  let index = InflationIndex::from_rows(page.rows);
  tracing::debug!(years = index.len(), "inflation index loaded");
  Ok(index)
}
