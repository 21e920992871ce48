use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;

use crate::store::backend::BackendError;
use crate::store::backend::Record;
use crate::store::backend::SheetBackend;

/// In-memory stand-in for the external sheet, used by the test suite. It
/// mirrors the workbook's observable semantics (header ordering, text
/// cells, source-row order) and can be switched into a failing mode to
/// exercise backend error propagation.
#[derive(Default)]
pub struct MemoryBackend {
  sheets: Mutex<BTreeMap<String, Sheet>>,
  failing: AtomicBool,
}

#[derive(Debug, Default)]
struct Sheet {
  header: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every subsequent operation fail, simulating an outage of the
  /// external data source.
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  fn check_available(&self) -> Result<(), BackendError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(BackendError::Rejected("simulated outage".to_string()));
    }
    Ok(())
  }
}

impl SheetBackend for MemoryBackend {
  async fn ensure_table(&self, name: &str, header: &[&str]) -> Result<(), BackendError> {
    self.check_available()?;
    let mut sheets = self.sheets.lock().await;
    let sheet = sheets.entry(name.to_string()).or_default();
    if sheet.header.is_empty() {
      sheet.header = header.iter().map(|column| column.to_string()).collect();
    }
    Ok(())
  }

  async fn append_row(&self, table: &str, record: &Record) -> Result<(), BackendError> {
    self.check_available()?;
    let mut sheets = self.sheets.lock().await;
    let sheet = sheets
      .get_mut(table)
      .ok_or_else(|| BackendError::MissingTable(table.to_string()))?;
    let row = sheet
      .header
      .iter()
      .map(|column| record.get(column).cloned().unwrap_or_default())
      .collect();
    sheet.rows.push(row);
    Ok(())
  }

  async fn list_rows(&self, table: &str) -> Result<Vec<Record>, BackendError> {
    self.check_available()?;
    let sheets = self.sheets.lock().await;
    let sheet = sheets
      .get(table)
      .ok_or_else(|| BackendError::MissingTable(table.to_string()))?;
    Ok(
      sheet
        .rows
        .iter()
        .map(|row| {
          sheet
            .header
            .iter()
            .enumerate()
            .map(|(position, column)| (column.clone(), row.get(position).cloned().unwrap_or_default()))
            .collect()
        })
        .collect(),
    )
  }

  async fn patch_row(&self, table: &str, index: usize, fields: &Record) -> Result<(), BackendError> {
    self.check_available()?;
    let mut sheets = self.sheets.lock().await;
    let sheet = sheets
      .get_mut(table)
      .ok_or_else(|| BackendError::MissingTable(table.to_string()))?;
    let header = sheet.header.clone();
    let row = sheet.rows.get_mut(index).ok_or_else(|| BackendError::RowOutOfRange {
      table: table.to_string(),
      index,
    })?;
    if row.len() < header.len() {
      row.resize(header.len(), String::new());
    }
    for (position, column) in header.iter().enumerate() {
      if let Some(value) = fields.get(column) {
        row[position] = value.clone();
      }
    }
    Ok(())
  }
}
