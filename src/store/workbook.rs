use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;
use tracing::instrument;

use crate::store::backend::BackendError;
use crate::store::backend::Record;
use crate::store::backend::SheetBackend;

/// File-backed sheet storage: one JSON document holding every table, the
/// way the hosted spreadsheet held one worksheet per table. Every mutation
/// rewrites the whole file, which is fine at the assumed scale of a few
/// hundred rows.
pub struct WorkbookBackend {
  path: PathBuf,
  document: Mutex<Workbook>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Workbook {
  sheets: BTreeMap<String, Sheet>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sheet {
  header: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl WorkbookBackend {
  pub async fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
    let path = path.into();
    let document = match tokio::fs::read(&path).await {
      Ok(bytes) => serde_json::from_slice(&bytes)?,
      Err(err) if err.kind() == ErrorKind::NotFound => Workbook::default(),
      Err(err) => return Err(err.into()),
    };
    info!(path = %path.display(), "opened workbook");
    Ok(Self {
      path,
      document: Mutex::new(document),
    })
  }

  async fn persist(&self, document: &Workbook) -> Result<(), BackendError> {
    let bytes = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(&self.path, bytes).await?;
    Ok(())
  }
}

impl SheetBackend for WorkbookBackend {
  #[instrument(skip(self, header))]
  async fn ensure_table(&self, name: &str, header: &[&str]) -> Result<(), BackendError> {
    let mut document = self.document.lock().await;
    let changed = match document.sheets.get_mut(name) {
      None => {
        document.sheets.insert(
          name.to_string(),
          Sheet {
            header: header.iter().map(|column| column.to_string()).collect(),
            rows: Vec::new(),
          },
        );
        info!(table = name, "created sheet");
        true
      },
      Some(sheet) if sheet.header.is_empty() => {
        sheet.header = header.iter().map(|column| column.to_string()).collect();
        info!(table = name, "added header to existing sheet");
        true
      },
      Some(_) => false,
    };

    if changed {
      self.persist(&document).await?;
    }
    Ok(())
  }

  #[instrument(skip(self, record))]
  async fn append_row(&self, table: &str, record: &Record) -> Result<(), BackendError> {
    let mut document = self.document.lock().await;
    let sheet = document
      .sheets
      .get_mut(table)
      .ok_or_else(|| BackendError::MissingTable(table.to_string()))?;
    let row = sheet
      .header
      .iter()
      .map(|column| record.get(column).cloned().unwrap_or_default())
      .collect();
    sheet.rows.push(row);
    self.persist(&document).await
  }

  #[instrument(skip(self))]
  async fn list_rows(&self, table: &str) -> Result<Vec<Record>, BackendError> {
    let document = self.document.lock().await;
    let sheet = document
      .sheets
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

  #[instrument(skip(self, fields))]
  async fn patch_row(&self, table: &str, index: usize, fields: &Record) -> Result<(), BackendError> {
    let mut document = self.document.lock().await;
    let sheet = document
      .sheets
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
    self.persist(&document).await
  }
}
