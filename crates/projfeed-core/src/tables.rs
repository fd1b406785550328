//! The declarative table registry that drives generic table CRUD.
//!
//! Each [`TableDef`] names a store table, its primary key, its editable
//! columns, the filters offered to users and the columns searched by free
//! text. Only registered tables are reachable through the generic CRUD
//! surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  store::{Filter, Order, Query, Row},
};

/// How raw (query-string) values are interpreted for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
  #[default]
  Text,
  Number,
}

fn yes() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
  pub key:      String,
  pub label:    String,
  #[serde(rename = "type", default)]
  pub kind:     ColumnType,
  #[serde(default)]
  pub required: bool,
  #[serde(default = "yes")]
  pub editable: bool,
}

/// A filter offered to users, with its allowed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
  pub key:     String,
  pub label:   String,
  #[serde(default)]
  pub options: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
  pub title:        String,
  pub table:        String,
  pub pk:           String,
  pub default_sort: Option<Order>,
  pub columns:      Vec<ColumnDef>,
  #[serde(default)]
  pub filters:      Vec<FilterDef>,
  /// Free-text search is applied only when this is non-empty.
  #[serde(default)]
  pub search_cols:  Vec<String>,
}

/// Paging, search and filter input for [`TableDef::list_query`].
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
  pub search:    Option<String>,
  /// `(column, raw value)` pairs; every column must be a registered filter.
  pub filters:   Vec<(String, String)>,
}

impl TableDef {
  pub fn column(&self, key: &str) -> Option<&ColumnDef> {
    self.columns.iter().find(|c| c.key == key)
  }

  fn unknown_column(&self, column: &str) -> Error {
    Error::UnknownColumn { table: self.table.clone(), column: column.to_owned() }
  }

  /// Interpret a raw string for `column` according to its declared type.
  /// The primary key is numeric unless declared otherwise.
  pub fn coerce(&self, column: &str, raw: &str) -> Result<Value> {
    let kind = match self.column(column) {
      Some(def) => def.kind,
      None if column == self.pk => ColumnType::Number,
      None => return Err(self.unknown_column(column)),
    };
    match kind {
      ColumnType::Text => Ok(Value::String(raw.to_owned())),
      ColumnType::Number => {
        let invalid = || Error::InvalidValue {
          column: column.to_owned(),
          value:  raw.to_owned(),
        };
        if let Ok(i) = raw.trim().parse::<i64>() {
          return Ok(Value::from(i));
        }
        let f = raw.trim().parse::<f64>().map_err(|_| invalid())?;
        serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(invalid)
      }
    }
  }

  /// Build the store query for one page of this table.
  pub fn list_query(&self, request: &ListRequest) -> Result<Query> {
    let mut query = Query::new().page(
      request.page.unwrap_or(1),
      Some(request.page_size.unwrap_or(crate::store::DEFAULT_PAGE_SIZE)),
    );

    for (key, raw) in &request.filters {
      if !self.filters.iter().any(|f| &f.key == key) {
        return Err(self.unknown_column(key));
      }
      query = query.filter(Filter::eq(key.clone(), self.coerce(key, raw)?));
    }

    if let Some(term) = &request.search
      && !self.search_cols.is_empty()
    {
      query = query.search(term.clone(), self.search_cols.iter().cloned());
    }

    if let Some(order) = &self.default_sort {
      query = query.order(order.clone());
    }
    Ok(query)
  }

  /// Check an insert: only known columns, every required column present and
  /// non-null.
  pub fn validate_insert(&self, row: &Row) -> Result<()> {
    if let Some(key) = row.keys().find(|k| self.column(k).is_none()) {
      return Err(self.unknown_column(key));
    }
    for col in self.columns.iter().filter(|c| c.required) {
      if row.get(&col.key).is_none_or(Value::is_null) {
        return Err(Error::MissingColumn {
          table:  self.table.clone(),
          column: col.key.clone(),
        });
      }
    }
    Ok(())
  }

  /// Check an update: only known, editable columns; required columns may not
  /// be cleared.
  pub fn validate_update(&self, patch: &Row) -> Result<()> {
    for (key, value) in patch {
      let col = self.column(key).ok_or_else(|| self.unknown_column(key))?;
      if !col.editable {
        return Err(Error::ReadOnlyColumn {
          table:  self.table.clone(),
          column: key.clone(),
        });
      }
      if col.required && value.is_null() {
        return Err(Error::MissingColumn {
          table:  self.table.clone(),
          column: key.clone(),
        });
      }
    }
    Ok(())
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRegistry {
  tables: Vec<TableDef>,
}

impl TableRegistry {
  pub fn new(tables: Vec<TableDef>) -> Self { Self { tables } }

  pub fn tables(&self) -> &[TableDef] { &self.tables }

  pub fn get(&self, table: &str) -> Result<&TableDef> {
    self
      .tables
      .iter()
      .find(|t| t.table == table)
      .ok_or_else(|| Error::UnknownTable(table.to_owned()))
  }
}

fn column(key: &str, label: &str, kind: ColumnType, required: bool) -> ColumnDef {
  ColumnDef { key: key.to_owned(), label: label.to_owned(), kind, required, editable: true }
}

fn filter(key: &str, label: &str, options: Vec<Value>) -> FilterDef {
  FilterDef { key: key.to_owned(), label: label.to_owned(), options }
}

impl Default for TableRegistry {
  fn default() -> Self {
    use ColumnType::{Number, Text};

    let inflators = TableDef {
      title:        "Inflators".into(),
      table:        "inflators".into(),
      pk:           "id".into(),
      default_sort: Some(Order::asc("year")),
      columns:      vec![
        ColumnDef { editable: false, ..column("year", "Year", Number, true) },
        column("inflation_index", "Index", Number, true),
      ],
      filters:      vec![],
      search_cols:  vec![],
    };

    let aceps = TableDef {
      title:        "ACEPs".into(),
      table:        "aceps".into(),
      pk:           "id".into(),
      default_sort: Some(Order::asc("agency")),
      columns:      vec![
        column("agency", "Agency", Text, true),
        column("cip", "CIP", Number, true),
        column("category", "Category", Number, true),
        column("element", "Element", Number, true),
        column("project", "Project", Number, false),
      ],
      filters:      vec![
        filter("agency", "Agency", vec!["T".into(), "S".into(), "L".into()]),
        filter("cip", "CIP", vec![7.into(), 8.into(), 9.into()]),
        filter("category", "Category", (1..=16).map(Value::from).collect()),
      ],
      search_cols:  vec!["agency".into()],
    };

    Self::new(vec![inflators, aceps])
  }
}
