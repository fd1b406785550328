//! [`SqliteStore`] — the SQLite implementation of [`DataStore`].

use std::path::Path;

use projfeed_core::store::{DataStore, Page, Query, Row, ScopedStore};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawRows, encode_value, ident, order_clause, read_rows, select_list, where_clause,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A projfeed store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Each clone
/// may act as a different user (see [`ScopedStore`]).
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  user: Option<Uuid>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, user: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, user: None };
    store.init_schema().await?;
    Ok(store)
  }

  /// A handle acting as `user` (or as nobody).
  pub fn with_user(&self, user: Option<Uuid>) -> Self {
    Self { conn: self.conn.clone(), user }
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a row-returning statement and decode every row.
  async fn fetch(&self, sql: String, params: Vec<SqlValue>) -> Result<Vec<Row>> {
    tracing::trace!(%sql, "fetch");
    let raw: RawRows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        Ok(read_rows(&mut stmt, &params)?)
      })
      .await?;
    raw.into_rows()
  }

  /// Run a statement expected to return at most one row.
  async fn fetch_one(&self, sql: String, params: Vec<SqlValue>) -> Result<Option<Row>> {
    Ok(self.fetch(sql, params).await?.into_iter().next())
  }

  fn not_found(table: &str, column: &str, value: &Value) -> Error {
    Error::NotFound {
      table:  table.to_owned(),
      column: column.to_owned(),
      value:  value.to_string(),
    }
  }
}

// ─── DataStore impl ──────────────────────────────────────────────────────────

impl DataStore for SqliteStore {
  type Error = Error;

  async fn user_id(&self) -> Result<Option<Uuid>> { Ok(self.user) }

  async fn query(&self, table: &str, query: &Query) -> Result<Page> {
    let table  = ident(table)?;
    let select = select_list(query.select.as_deref())?;
    let filter = where_clause(query)?;
    let order  = order_clause(query)?;

    let count_sql    = format!("SELECT COUNT(*) FROM {table} {}", filter.sql);
    let count_params = filter.params.clone();
    let total: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &count_sql,
          rusqlite::params_from_iter(count_params.iter()),
          |r| r.get(0),
        )?)
      })
      .await?;

    let mut params = filter.params;
    let mut sql = format!("SELECT {select} FROM {table} {} {order}", filter.sql);
    let total = u64::try_from(total).unwrap_or(0);
    if let Some((limit, offset)) = query.window() {
      // SQLite reads a negative OFFSET as 0; a page past i64 is past the end.
      let (Ok(limit), Ok(offset)) = (i64::try_from(limit), i64::try_from(offset)) else {
        tracing::debug!(table, limit, offset, "page window out of range");
        return Ok(Page { rows: Vec::new(), total });
      };
      sql.push_str(" LIMIT ? OFFSET ?");
      params.push(SqlValue::Integer(limit));
      params.push(SqlValue::Integer(offset));
    }

    let rows = self.fetch(sql, params).await?;
    Ok(Page { rows, total })
  }

  async fn insert(&self, table: &str, row: Row) -> Result<Row> {
    let table = ident(table)?;

    let sql = if row.is_empty() {
      format!("INSERT INTO {table} DEFAULT VALUES RETURNING *")
    } else {
      let cols = row
        .keys()
        .map(|k| ident(k))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
      let marks = vec!["?"; row.len()].join(", ");
      format!("INSERT INTO {table} ({cols}) VALUES ({marks}) RETURNING *")
    };
    let params = row.values().map(encode_value).collect::<Result<Vec<_>>>()?;

    let inserted = self.fetch_one(sql, params).await?;
    tracing::debug!(table, "row inserted");
    inserted.ok_or_else(|| Self::not_found(table, "rowid", &Value::Null))
  }

  async fn update(
    &self,
    table:    &str,
    pk_field: &str,
    pk_value: &Value,
    patch:    Row,
  ) -> Result<Row> {
    let table    = ident(table)?;
    let pk_field = ident(pk_field)?;

    if patch.is_empty() {
      return self
        .find_one(table, pk_field, pk_value, None)
        .await?
        .ok_or_else(|| Self::not_found(table, pk_field, pk_value));
    }

    let sets = patch
      .keys()
      .map(|k| Ok(format!("{} = ?", ident(k)?)))
      .collect::<Result<Vec<_>>>()?
      .join(", ");
    let mut params = patch.values().map(encode_value).collect::<Result<Vec<_>>>()?;
    params.push(encode_value(pk_value)?);

    let sql = format!("UPDATE {table} SET {sets} WHERE {pk_field} = ? RETURNING *");
    self
      .fetch_one(sql, params)
      .await?
      .ok_or_else(|| Self::not_found(table, pk_field, pk_value))
  }

  async fn delete(&self, table: &str, pk_field: &str, pk_value: &Value) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", ident(table)?, ident(pk_field)?);
    let param = encode_value(pk_value)?;

    let affected = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, [param])?))
      .await?;
    tracing::debug!(table, affected, "rows deleted");
    Ok(())
  }

  async fn find_one(
    &self,
    table:  &str,
    field:  &str,
    value:  &Value,
    select: Option<&str>,
  ) -> Result<Option<Row>> {
    let sql = format!(
      "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
      select_list(select)?,
      ident(table)?,
      ident(field)?,
    );
    self.fetch_one(sql, vec![encode_value(value)?]).await
  }
}

impl ScopedStore for SqliteStore {
  fn scoped_to(&self, user_id: Uuid) -> Self { self.with_user(Some(user_id)) }
}

#[cfg(test)]
impl SqliteStore {
  pub(crate) async fn count(&self, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", ident(table)?);
    let n = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
      .await?;
    Ok(n)
  }
}
