//! Aggregate reconciliation.
//!
//! Some columns are maintained by the store (an estimate's `total_amount` is
//! recomputed by a trigger whenever its tasks change). After dependent rows
//! are written the parent is re-read so the event reflects the stored value.

use projfeed_core::{record::Record, store::DataStore};
use serde_json::Value;

use crate::{Error, Result};

/// Re-read `snapshot` by primary key, falling back to `snapshot` itself when
/// the row cannot be found.
pub async fn reread<S, R>(store: &S, snapshot: R) -> Result<R>
where
  S: DataStore,
  R: Record,
{
  let row = store
    .find_one(R::TABLE, "id", &Value::from(snapshot.id()), None)
    .await
    .map_err(Error::store)?;

  match row {
    Some(row) => Ok(R::from_row(row)?),
    None => {
      tracing::warn!(
        table = R::TABLE,
        id = snapshot.id(),
        "re-read found nothing; using pre-write snapshot"
      );
      Ok(snapshot)
    }
  }
}
