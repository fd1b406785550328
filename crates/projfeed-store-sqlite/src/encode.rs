//! Encoding helpers between JSON rows and SQLite statements.
//!
//! Table and column names are validated as plain identifiers before they are
//! spliced into SQL; every value travels as a bound parameter. JSON objects
//! and arrays are stored as compact JSON text and decoded again for the
//! columns listed in [`JSON_COLUMNS`].

use projfeed_core::store::{Direction, Filter, FilterOp, Query, Row};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::{Error, Result};

/// Columns holding JSON documents rather than plain text.
pub const JSON_COLUMNS: &[&str] = &["payload"];

// ─── Identifiers ─────────────────────────────────────────────────────────────

pub fn ident(name: &str) -> Result<&str> {
  let mut chars = name.chars();
  let valid = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(name)
  } else {
    Err(Error::InvalidIdentifier(name.to_owned()))
  }
}

/// Normalise a select list: `None` or `*` selects everything.
pub fn select_list(select: Option<&str>) -> Result<String> {
  match select.map(str::trim) {
    None | Some("") | Some("*") => Ok("*".to_owned()),
    Some(list) => {
      let cols = list
        .split(',')
        .map(|c| ident(c.trim()))
        .collect::<Result<Vec<_>>>()?;
      Ok(cols.join(", "))
    }
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(value: &Value) -> Result<SqlValue> {
  Ok(match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    Value::Array(_) | Value::Object(_) => SqlValue::Text(serde_json::to_string(value)?),
  })
}

pub fn decode_value(column: &str, value: SqlValue) -> Result<Value> {
  Ok(match value {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(i) => Value::from(i),
    SqlValue::Real(f) => serde_json::Number::from_f64(f)
      .map(Value::Number)
      .unwrap_or(Value::Null),
    SqlValue::Text(s) if JSON_COLUMNS.contains(&column) => serde_json::from_str(&s)?,
    SqlValue::Text(s) => Value::String(s),
    SqlValue::Blob(_) => return Err(Error::UnsupportedValue(column.to_owned())),
  })
}

/// Raw column names and values read inside a connection call, decoded into
/// [`Row`]s afterwards.
pub struct RawRows {
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<SqlValue>>,
}

impl RawRows {
  pub fn into_rows(self) -> Result<Vec<Row>> {
    let columns = self.columns;
    self
      .rows
      .into_iter()
      .map(|values| {
        columns
          .iter()
          .zip(values)
          .map(|(col, v)| Ok((col.clone(), decode_value(col, v)?)))
          .collect::<Result<Row>>()
      })
      .collect()
  }
}

/// Read every row of a prepared statement as raw values.
pub fn read_rows(
  stmt: &mut rusqlite::Statement<'_>,
  params: &[SqlValue],
) -> rusqlite::Result<RawRows> {
  let columns: Vec<String> =
    stmt.column_names().into_iter().map(str::to_owned).collect();
  let width = columns.len();

  let mut rows = Vec::new();
  let mut cursor = stmt.query(rusqlite::params_from_iter(params.iter()))?;
  while let Some(row) = cursor.next()? {
    let values = (0..width)
      .map(|i| row.get::<_, SqlValue>(i))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.push(values);
  }
  Ok(RawRows { columns, rows })
}

// ─── Statement building ──────────────────────────────────────────────────────

/// SQL fragment plus its bound parameters.
#[derive(Debug, Default)]
pub struct Clause {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

fn filter_sql(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
  let col = ident(&filter.key)?;
  let binary = |op: &str, params: &mut Vec<SqlValue>| -> Result<String> {
    params.push(encode_value(&filter.value)?);
    Ok(format!("{col} {op} ?"))
  };

  match filter.op {
    FilterOp::Eq if filter.value.is_null() => Ok(format!("{col} IS NULL")),
    FilterOp::Eq => binary("=", params),
    FilterOp::Neq => binary("!=", params),
    FilterOp::Gt => binary(">", params),
    FilterOp::Gte => binary(">=", params),
    FilterOp::Lt => binary("<", params),
    FilterOp::Lte => binary("<=", params),
    FilterOp::NotNull => Ok(format!("{col} IS NOT NULL")),
    FilterOp::IsNull => Ok(format!("{col} IS NULL")),
    FilterOp::In => {
      let values = filter
        .value
        .as_array()
        .ok_or_else(|| Error::ExpectedArray(filter.key.clone()))?;
      if values.is_empty() {
        return Ok("0".to_owned());
      }
      for v in values {
        params.push(encode_value(v)?);
      }
      let marks = vec!["?"; values.len()].join(", ");
      Ok(format!("{col} IN ({marks})"))
    }
  }
}

/// `WHERE ...` for the filters and search term of `query` (empty if none).
pub fn where_clause(query: &Query) -> Result<Clause> {
  let mut params = Vec::new();
  let mut conds = query
    .filters
    .iter()
    .map(|f| filter_sql(f, &mut params))
    .collect::<Result<Vec<_>>>()?;

  if let Some(term) = query.search_term() {
    let pattern = format!("%{term}%");
    let ors = query
      .search_cols
      .iter()
      .map(|c| {
        params.push(SqlValue::Text(pattern.clone()));
        Ok(format!("{} LIKE ?", ident(c)?))
      })
      .collect::<Result<Vec<_>>>()?;
    conds.push(format!("({})", ors.join(" OR ")));
  }

  let sql = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  Ok(Clause { sql, params })
}

/// `ORDER BY ...` for `query` (empty if unordered).
pub fn order_clause(query: &Query) -> Result<String> {
  if query.order.is_empty() {
    return Ok(String::new());
  }
  let terms = query
    .order
    .iter()
    .map(|o| {
      let dir = match o.dir {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
      };
      Ok(format!("{} {dir}", ident(&o.col)?))
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(format!("ORDER BY {}", terms.join(", ")))
}

#[cfg(test)]
mod tests {
  use projfeed_core::store::Order;
  use serde_json::json;

  use super::*;

  #[test]
  fn identifiers_are_validated() {
    assert!(ident("event_comments").is_ok());
    assert!(ident("_x1").is_ok());
    assert!(ident("1abc").is_err());
    assert!(ident("notes; DROP TABLE notes").is_err());
    assert!(ident("").is_err());
  }

  #[test]
  fn select_lists() {
    assert_eq!(select_list(None).unwrap(), "*");
    assert_eq!(select_list(Some(" * ")).unwrap(), "*");
    assert_eq!(select_list(Some("id, project_id,event_type")).unwrap(), "id, project_id, event_type");
    assert!(select_list(Some("id, count(*)")).is_err());
  }

  #[test]
  fn where_clause_binds_every_value() {
    let query = Query::all()
      .filter(Filter::eq("project_id", 1))
      .filter(Filter::neq("event_type", "comment.added"))
      .filter(Filter::any_of("id", [1, 2, 3]))
      .filter(Filter::not_null("summary"))
      .search("ab", ["summary", "event_type"]);

    let clause = where_clause(&query).unwrap();
    assert_eq!(
      clause.sql,
      "WHERE project_id = ? AND event_type != ? AND id IN (?, ?, ?) \
       AND summary IS NOT NULL AND (summary LIKE ? OR event_type LIKE ?)"
    );
    assert_eq!(clause.params.len(), 7);
    assert_eq!(clause.params[5], SqlValue::Text("%ab%".into()));
  }

  #[test]
  fn empty_in_matches_nothing() {
    let query = Query::all().filter(Filter::any_of("id", Vec::<i64>::new()));
    assert_eq!(where_clause(&query).unwrap().sql, "WHERE 0");
  }

  #[test]
  fn in_requires_an_array() {
    let query = Query::all().filter(Filter::new("id", FilterOp::In, 3));
    assert!(matches!(where_clause(&query), Err(Error::ExpectedArray(_))));
  }

  #[test]
  fn order_clause_keeps_sequence() {
    let query = Query::all().order(Order::desc("created_at")).order(Order::desc("id"));
    assert_eq!(order_clause(&query).unwrap(), "ORDER BY created_at DESC, id DESC");
  }

  #[test]
  fn values_round_trip_through_sql_types() {
    assert_eq!(encode_value(&json!(true)).unwrap(), SqlValue::Integer(1));
    assert_eq!(encode_value(&json!(2.5)).unwrap(), SqlValue::Real(2.5));
    assert_eq!(
      encode_value(&json!({ "a": 1 })).unwrap(),
      SqlValue::Text(r#"{"a":1}"#.into())
    );
    assert_eq!(
      decode_value("payload", SqlValue::Text(r#"{"a":1}"#.into())).unwrap(),
      json!({ "a": 1 })
    );
    assert_eq!(
      decode_value("summary", SqlValue::Text(r#"{"a":1}"#.into())).unwrap(),
      json!(r#"{"a":1}"#)
    );
  }
}
