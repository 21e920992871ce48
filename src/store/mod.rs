//! Generic row store over an external tabular backend.
//!
//! Each table maps a synthetic integer `id` to a flat field → text record.
//! Every operation is a linear scan over the table; that is a deliberate
//! trade-off at the assumed scale of a few hundred rows, and the matching
//! semantics (stringified comparison, first match wins) are part of the
//! contract.

pub mod backend;
pub mod memory;
pub mod workbook;

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tracing::instrument;

pub use backend::BackendError;
pub use backend::Record;
pub use backend::SheetBackend;
pub use workbook::WorkbookBackend;

const ID_FIELD: &str = "id";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error(transparent)]
  Backend(#[from] BackendError),
  #[error("table has not been initialized: {0}")]
  UnknownTable(String),
}

/// Result of an [`RowStore::update`]. A missing id is not an error — the
/// original behavior is a silent no-op — but callers get a named outcome
/// they can assert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
  Updated,
  NoSuchRow,
}

/// Owns the per-table handles for the process lifetime. Constructed once at
/// startup and shared by reference; there is no global table cache.
pub struct RowStore<B> {
  backend: B,
  tables: HashMap<String, TableHandle>,
  serialize_writes: bool,
}

#[derive(Default)]
struct TableHandle {
  write_lock: Mutex<()>,
}

impl<B: SheetBackend> RowStore<B> {
  /// Idempotently ensures every named table exists with its header and
  /// never destroys existing data. Failure here is fatal to startup.
  ///
  /// Scan-then-write operations are serialized per table by default; the
  /// external source may still be shared with other writers, so duplicate
  /// ids remain possible across processes.
  pub async fn open(backend: B, schemas: &[(&str, &[&str])]) -> Result<Self, StoreError> {
    let mut tables = HashMap::new();
    for (name, header) in schemas {
      backend.ensure_table(name, header).await?;
      tables.insert(name.to_string(), TableHandle::default());
    }
    Ok(Self {
      backend,
      tables,
      serialize_writes: true,
    })
  }

  /// Opts out of per-table write serialization, restoring the original
  /// race-prone `next_id` + append behavior.
  pub fn without_write_locks(mut self) -> Self {
    self.serialize_writes = false;
    self
  }

  fn handle(&self, table: &str) -> Result<&TableHandle, StoreError> {
    self
      .tables
      .get(table)
      .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
  }

  async fn write_guard<'a>(&self, handle: &'a TableHandle) -> Option<MutexGuard<'a, ()>> {
    if self.serialize_writes {
      Some(handle.write_lock.lock().await)
    } else {
      None
    }
  }

  /// `1` for an empty table, else `max(existing ids) + 1`. Not atomic with
  /// a subsequent insert unless the insert itself takes the table lock.
  #[instrument(skip(self))]
  pub async fn next_id(&self, table: &str) -> Result<i64, StoreError> {
    self.handle(table)?;
    self.next_id_unlocked(table).await
  }

  async fn next_id_unlocked(&self, table: &str) -> Result<i64, StoreError> {
    let rows = self.backend.list_rows(table).await?;
    let max = rows
      .iter()
      .map(|row| {
        row
          .get(ID_FIELD)
          .and_then(|value| value.trim().parse::<i64>().ok())
          .unwrap_or(0)
      })
      .max()
      .unwrap_or(0);
    Ok(max + 1)
  }

  /// Assigns an id, appends `{id} ∪ fields`, and returns the full record.
  #[instrument(skip(self, fields))]
  pub async fn insert(&self, table: &str, fields: Record) -> Result<Record, StoreError> {
    let handle = self.handle(table)?;
    let _guard = self.write_guard(handle).await;
    let id = self.next_id_unlocked(table).await?;
    let mut record = fields;
    record.insert(ID_FIELD.to_string(), id.to_string());
    self.backend.append_row(table, &record).await?;
    Ok(record)
  }

  /// Overwrites only the given fields of the row whose `id` matches. A
  /// missing id succeeds as a no-op and reports [`UpdateOutcome::NoSuchRow`].
  #[instrument(skip(self, fields))]
  pub async fn update(&self, table: &str, id: i64, fields: Record) -> Result<UpdateOutcome, StoreError> {
    let handle = self.handle(table)?;
    let _guard = self.write_guard(handle).await;
    let rows = self.backend.list_rows(table).await?;
    for (index, row) in rows.iter().enumerate() {
      let row_id = row.get(ID_FIELD).and_then(|value| value.trim().parse::<i64>().ok());
      if row_id == Some(id) {
        self.backend.patch_row(table, index, &fields).await?;
        return Ok(UpdateOutcome::Updated);
      }
    }
    Ok(UpdateOutcome::NoSuchRow)
  }

  /// First row whose field stringifies equal to `value`'s string form, so
  /// `1` and `"1"` match. First match wins on duplicate values.
  #[instrument(skip(self, value))]
  pub async fn find(
    &self,
    table: &str,
    field: &str,
    value: impl std::fmt::Display,
  ) -> Result<Option<Record>, StoreError> {
    self.handle(table)?;
    let needle = value.to_string();
    let rows = self.backend.list_rows(table).await?;
    Ok(rows.into_iter().find(|row| row.get(field) == Some(&needle)))
  }

  /// Every row, in source order.
  #[instrument(skip(self))]
  pub async fn get_all(&self, table: &str) -> Result<Vec<Record>, StoreError> {
    self.handle(table)?;
    Ok(self.backend.list_rows(table).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::RowStore;
  use super::StoreError;
  use super::UpdateOutcome;
  use crate::store::Record;
  use crate::store::memory::MemoryBackend;

  const SCHEMAS: &[(&str, &[&str])] = &[("Products", &["id", "name", "stock"])];

  async fn store() -> RowStore<MemoryBackend> {
    RowStore::open(MemoryBackend::new(), SCHEMAS).await.unwrap()
  }

  fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
      .iter()
      .map(|(key, value)| (key.to_string(), value.to_string()))
      .collect()
  }

  #[tokio::test]
  async fn next_id_starts_at_one() {
    let store = store().await;
    assert_eq!(store.next_id("Products").await.unwrap(), 1);
  }

  #[tokio::test]
  async fn next_id_counts_up_after_inserts() {
    let store = store().await;
    for n in 0 .. 3 {
      let inserted = store
        .insert("Products", record(&[("name", &format!("p{n}")), ("stock", "1")]))
        .await
        .unwrap();
      assert_eq!(inserted.get("id").map(String::as_str), Some(format!("{}", n + 1).as_str()));
    }
    assert_eq!(store.next_id("Products").await.unwrap(), 4);
  }

  #[tokio::test]
  async fn find_matches_number_and_string_forms() {
    let store = store().await;
    store
      .insert("Products", record(&[("name", "Espresso"), ("stock", "3")]))
      .await
      .unwrap();

    let by_number = store.find("Products", "id", 1).await.unwrap();
    let by_string = store.find("Products", "id", "1").await.unwrap();
    assert_eq!(by_number, by_string);
    assert!(by_number.is_some());
  }

  #[tokio::test]
  async fn find_returns_first_match_on_duplicates() {
    let store = store().await;
    store
      .insert("Products", record(&[("name", "Latte"), ("stock", "5")]))
      .await
      .unwrap();
    store
      .insert("Products", record(&[("name", "Latte"), ("stock", "9")]))
      .await
      .unwrap();

    let found = store.find("Products", "name", "Latte").await.unwrap().unwrap();
    assert_eq!(found.get("stock").map(String::as_str), Some("5"));
  }

  #[tokio::test]
  async fn update_missing_id_is_a_named_no_op() {
    let store = store().await;
    store
      .insert("Products", record(&[("name", "Mocha"), ("stock", "2")]))
      .await
      .unwrap();
    let before = store.get_all("Products").await.unwrap();

    let outcome = store
      .update("Products", 99, record(&[("stock", "0")]))
      .await
      .unwrap();
    assert_eq!(outcome, UpdateOutcome::NoSuchRow);
    assert_eq!(store.get_all("Products").await.unwrap(), before);
  }

  #[tokio::test]
  async fn update_patches_only_given_fields() {
    let store = store().await;
    store
      .insert("Products", record(&[("name", "Flat white"), ("stock", "7")]))
      .await
      .unwrap();

    let outcome = store
      .update("Products", 1, record(&[("stock", "6")]))
      .await
      .unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated);

    let row = store.find("Products", "id", 1).await.unwrap().unwrap();
    assert_eq!(row.get("name").map(String::as_str), Some("Flat white"));
    assert_eq!(row.get("stock").map(String::as_str), Some("6"));
  }

  #[tokio::test]
  async fn uninitialized_table_is_rejected() {
    let store = store().await;
    let err = store.get_all("Orders").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownTable(name) if name == "Orders"));
  }

  #[tokio::test]
  async fn backend_outage_surfaces_as_backend_error() {
    let backend = MemoryBackend::new();
    let store = RowStore::open(backend, SCHEMAS).await.unwrap();
    store.backend.set_failing(true);

    let err = store
      .insert("Products", record(&[("name", "Cortado"), ("stock", "1")]))
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
  }

  #[tokio::test]
  async fn opting_out_of_write_locks_keeps_semantics() {
    let store = store().await.without_write_locks();
    store
      .insert("Products", record(&[("name", "Ristretto"), ("stock", "1")]))
      .await
      .unwrap();
    assert_eq!(store.next_id("Products").await.unwrap(), 2);
  }
}
