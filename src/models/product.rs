use chrono::DateTime;
use chrono::Utc;

use crate::models::PRODUCTS_TABLE;
use crate::models::bool_field;
use crate::models::encode_timestamp;
use crate::models::id_field;
use crate::models::int_field;
use crate::models::money_field;
use crate::models::text_field;
use crate::models::timestamp_field;
use crate::store::Record;
use crate::store::RowStore;
use crate::store::SheetBackend;
use crate::store::StoreError;
use crate::util::encode_cents;

/// One row of the Products table. `price` is unit price in cents, stored in
/// the sheet as `12.50`-style text. `stock` never goes below zero; writes
/// that would make it negative are clamped.
#[derive(Debug, Clone)]
pub struct Product {
  pub id: Option<i64>,
  pub name: String,
  pub description: String,
  pub price: i64,
  pub stock: i64,
  pub is_available: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  pub fn new(name: &str, description: &str, price: i64, stock: i64) -> Self {
    let now = Utc::now();
    Self {
      id: None,
      name: name.to_string(),
      description: description.to_string(),
      price: price.max(0),
      stock: stock.max(0),
      is_available: true,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn from_record(record: &Record) -> Self {
    Self {
      id: id_field(record),
      name: text_field(record, "name"),
      description: text_field(record, "description"),
      price: money_field(record, "price"),
      stock: int_field(record, "stock").max(0),
      is_available: bool_field(record, "is_available"),
      created_at: timestamp_field(record, "created_at"),
      updated_at: timestamp_field(record, "updated_at"),
    }
  }

  fn to_record(&self) -> Record {
    Record::from([
      ("name".to_string(), self.name.clone()),
      ("description".to_string(), self.description.clone()),
      ("price".to_string(), encode_cents(self.price)),
      ("stock".to_string(), self.stock.max(0).to_string()),
      ("is_available".to_string(), self.is_available.to_string()),
      ("created_at".to_string(), encode_timestamp(self.created_at)),
      ("updated_at".to_string(), encode_timestamp(self.updated_at)),
    ])
  }

  /// Inserts on first save, updates the full snapshot afterwards.
  /// `updated_at` is bumped on every save.
  pub async fn save<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    self.updated_at = Utc::now();
    match self.id {
      Some(id) => {
        let mut fields = self.to_record();
        fields.insert("id".to_string(), id.to_string());
        store.update(PRODUCTS_TABLE, id, fields).await?;
      },
      None => {
        let record = store.insert(PRODUCTS_TABLE, self.to_record()).await?;
        self.id = id_field(&record);
      },
    }
    Ok(())
  }

  pub async fn get_by_id<B: SheetBackend>(store: &RowStore<B>, product_id: i64) -> Result<Option<Self>, StoreError> {
    let record = store.find(PRODUCTS_TABLE, "id", product_id).await?;
    Ok(record.as_ref().map(Self::from_record))
  }

  pub async fn get_all<B: SheetBackend>(store: &RowStore<B>, available_only: bool) -> Result<Vec<Self>, StoreError> {
    let records = store.get_all(PRODUCTS_TABLE).await?;
    let mut products: Vec<Self> = records.iter().map(Self::from_record).collect();
    if available_only {
      products.retain(|product| product.is_available);
    }
    Ok(products)
  }
}
