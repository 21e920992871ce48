use std::collections::BTreeMap;

use thiserror::Error;

/// One sheet row as a flat field → text mapping. Every cell is stored as
/// text; typed views are reconstructed by the domain models.
pub type Record = BTreeMap<String, String>;

/// Failure talking to the external tabular storage. The store does not
/// distinguish auth, quota, or network causes; callers only see that the
/// operation failed.
#[derive(Debug, Error)]
pub enum BackendError {
  #[error("table not found: {0}")]
  MissingTable(String),
  #[error("row index {index} out of range for table {table}")]
  RowOutOfRange { table: String, index: usize },
  #[error("failed to reach sheet storage: {0}")]
  Io(#[from] std::io::Error),
  #[error("malformed sheet document: {0}")]
  Corrupt(#[from] serde_json::Error),
  #[error("sheet storage rejected the operation: {0}")]
  Rejected(String),
}

/// Boundary to the external tabular data source. Tables are a header of
/// column names followed by one row per record; rows keep source order.
#[allow(async_fn_in_trait)]
pub trait SheetBackend: Send + Sync {
  /// Idempotently makes sure the table exists with the given header. An
  /// existing table keeps its rows; a header is only written if the table
  /// has none.
  async fn ensure_table(&self, name: &str, header: &[&str]) -> Result<(), BackendError>;

  /// Appends one row. Fields not present in the header are dropped,
  /// missing fields become empty cells.
  async fn append_row(&self, table: &str, record: &Record) -> Result<(), BackendError>;

  /// Materializes every row in source order.
  async fn list_rows(&self, table: &str) -> Result<Vec<Record>, BackendError>;

  /// Overwrites the given fields of the row at `index` (0-based, counting
  /// data rows only) and persists it.
  async fn patch_row(&self, table: &str, index: usize, fields: &Record) -> Result<(), BackendError>;
}
