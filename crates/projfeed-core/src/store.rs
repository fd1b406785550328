//! The `DataStore` trait and supporting query types.
//!
//! The trait is the narrow data-access seam between the event service and a
//! relational backend (e.g. `projfeed-store-sqlite`). Rows travel as JSON
//! object maps so the same adapter serves typed domain records and the
//! registry-driven table CRUD alike.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single table row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Page size applied when a [`Query`] does not say otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Build a [`Row`] from a `serde_json::json!({...})` literal. Anything other
/// than an object yields an empty row.
pub fn row(value: Value) -> Row {
  match value {
    Value::Object(map) => map,
    _ => Row::new(),
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
  Eq,
  Neq,
  Gt,
  Gte,
  Lt,
  Lte,
  /// `value` must be an array; matches any element.
  In,
  /// `value` is ignored.
  NotNull,
  /// `value` is ignored.
  IsNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
  pub key:   String,
  pub op:    FilterOp,
  #[serde(default)]
  pub value: Value,
}

impl Filter {
  pub fn new(key: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
    Self { key: key.into(), op, value: value.into() }
  }

  pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::new(key, FilterOp::Eq, value)
  }

  pub fn neq(key: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::new(key, FilterOp::Neq, value)
  }

  pub fn any_of<V: Into<Value>>(
    key: impl Into<String>,
    values: impl IntoIterator<Item = V>,
  ) -> Self {
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    Self::new(key, FilterOp::In, Value::Array(values))
  }

  pub fn not_null(key: impl Into<String>) -> Self {
    Self::new(key, FilterOp::NotNull, Value::Null)
  }
}

// ─── Ordering ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub col: String,
  #[serde(default)]
  pub dir: Direction,
}

impl Order {
  pub fn asc(col: impl Into<String>) -> Self {
    Self { col: col.into(), dir: Direction::Asc }
  }

  pub fn desc(col: impl Into<String>) -> Self {
    Self { col: col.into(), dir: Direction::Desc }
  }
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`DataStore::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
  /// Comma-separated column list; `None` selects every column.
  pub select:      Option<String>,
  /// 1-based page number.
  pub page:        u32,
  /// `None` disables pagination and returns every matching row.
  pub page_size:   Option<u32>,
  /// Applied in sequence; earlier entries take precedence.
  pub order:       Vec<Order>,
  /// All filters must match.
  pub filters:     Vec<Filter>,
  /// Case-insensitive substring matched against any of `search_cols`.
  pub search:      Option<String>,
  pub search_cols: Vec<String>,
}

impl Default for Query {
  fn default() -> Self {
    Self {
      select:      None,
      page:        1,
      page_size:   Some(DEFAULT_PAGE_SIZE),
      order:       Vec::new(),
      filters:     Vec::new(),
      search:      None,
      search_cols: Vec::new(),
    }
  }
}

impl Query {
  pub fn new() -> Self { Self::default() }

  /// A query that returns every matching row.
  pub fn all() -> Self {
    Self { page_size: None, ..Self::default() }
  }

  /// A query that returns at most `n` rows.
  pub fn first(n: u32) -> Self {
    Self { page_size: Some(n), ..Self::default() }
  }

  pub fn select(mut self, columns: impl Into<String>) -> Self {
    self.select = Some(columns.into());
    self
  }

  pub fn page(mut self, page: u32, page_size: Option<u32>) -> Self {
    self.page = page;
    self.page_size = page_size;
    self
  }

  pub fn filter(mut self, filter: Filter) -> Self {
    self.filters.push(filter);
    self
  }

  pub fn order(mut self, order: Order) -> Self {
    self.order.push(order);
    self
  }

  pub fn search<C: Into<String>>(
    mut self,
    term: impl Into<String>,
    columns: impl IntoIterator<Item = C>,
  ) -> Self {
    self.search = Some(term.into());
    self.search_cols = columns.into_iter().map(Into::into).collect();
    self
  }

  /// `(limit, offset)` for the requested page, or `None` when pagination is
  /// disabled. Pages below 1 are treated as page 1.
  pub fn window(&self) -> Option<(u64, u64)> {
    let size = u64::from(self.page_size?);
    let page = u64::from(self.page.max(1));
    Some((size, (page - 1) * size))
  }

  /// The trimmed search term, if search applies at all.
  pub fn search_term(&self) -> Option<&str> {
    let term = self.search.as_deref()?.trim();
    (!term.is_empty() && !self.search_cols.is_empty()).then_some(term)
  }
}

/// Result of [`DataStore::query`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
  pub rows:  Vec<Row>,
  /// Number of rows matching the filters, ignoring pagination.
  pub total: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a relational store.
///
/// Every operation fails with the backend's own error type; callers treat it
/// as an opaque message and never inspect its variants.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DataStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The authenticated actor on whose behalf this handle operates.
  fn user_id(
    &self,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// Filter, search, sort and page rows of `table`.
  fn query<'a>(
    &'a self,
    table: &'a str,
    query: &'a Query,
  ) -> impl Future<Output = Result<Page, Self::Error>> + Send + 'a;

  /// Insert a single row and return it with generated fields populated.
  fn insert<'a>(
    &'a self,
    table: &'a str,
    row: Row,
  ) -> impl Future<Output = Result<Row, Self::Error>> + Send + 'a;

  /// Apply `patch` to the row whose `pk_field` equals `pk_value`.
  fn update<'a>(
    &'a self,
    table: &'a str,
    pk_field: &'a str,
    pk_value: &'a Value,
    patch: Row,
  ) -> impl Future<Output = Result<Row, Self::Error>> + Send + 'a;

  /// Delete the row whose `pk_field` equals `pk_value`.
  fn delete<'a>(
    &'a self,
    table: &'a str,
    pk_field: &'a str,
    pk_value: &'a Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The first row whose `field` equals `value`, or `None`.
  fn find_one<'a>(
    &'a self,
    table: &'a str,
    field: &'a str,
    value: &'a Value,
    select: Option<&'a str>,
  ) -> impl Future<Output = Result<Option<Row>, Self::Error>> + Send + 'a;
}

/// A store handle that can be re-bound to a different acting user without
/// opening a new connection.
pub trait ScopedStore: DataStore + Clone {
  fn scoped_to(&self, user_id: Uuid) -> Self;
}
