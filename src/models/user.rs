use chrono::DateTime;
use chrono::Utc;

use crate::models::USERS_TABLE;
use crate::models::bool_field;
use crate::models::encode_timestamp;
use crate::models::id_field;
use crate::models::int_field;
use crate::models::text_field;
use crate::models::timestamp_field;
use crate::store::Record;
use crate::store::RowStore;
use crate::store::SheetBackend;
use crate::store::StoreError;

/// One row of the Users table. Exactly one record exists per `telegram_id`;
/// users are created lazily on first interaction.
#[derive(Debug, Clone)]
pub struct User {
  pub id: Option<i64>,
  pub telegram_id: i64,
  pub username: String,
  pub first_name: String,
  pub last_name: String,
  pub is_admin: bool,
  pub created_at: DateTime<Utc>,
}

impl User {
  pub fn new(
    telegram_id: i64,
    username: Option<&str>,
    first_name: &str,
    last_name: Option<&str>,
    is_admin: bool,
  ) -> Self {
    Self {
      id: None,
      telegram_id,
      username: username.unwrap_or_default().to_string(),
      first_name: first_name.to_string(),
      last_name: last_name.unwrap_or_default().to_string(),
      is_admin,
      created_at: Utc::now(),
    }
  }

  pub fn from_record(record: &Record) -> Self {
    Self {
      id: id_field(record),
      telegram_id: int_field(record, "telegram_id"),
      username: text_field(record, "username"),
      first_name: text_field(record, "first_name"),
      last_name: text_field(record, "last_name"),
      is_admin: bool_field(record, "is_admin"),
      created_at: timestamp_field(record, "created_at"),
    }
  }

  fn to_record(&self) -> Record {
    Record::from([
      ("telegram_id".to_string(), self.telegram_id.to_string()),
      ("username".to_string(), self.username.clone()),
      ("first_name".to_string(), self.first_name.clone()),
      ("last_name".to_string(), self.last_name.clone()),
      ("is_admin".to_string(), self.is_admin.to_string()),
      ("created_at".to_string(), encode_timestamp(self.created_at)),
    ])
  }

  /// Inserts on first save, updates the full field snapshot afterwards.
  pub async fn save<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    match self.id {
      Some(id) => {
        let mut fields = self.to_record();
        fields.insert("id".to_string(), id.to_string());
        store.update(USERS_TABLE, id, fields).await?;
      },
      None => {
        let record = store.insert(USERS_TABLE, self.to_record()).await?;
        self.id = id_field(&record);
      },
    }
    Ok(())
  }

  pub async fn get_by_id<B: SheetBackend>(store: &RowStore<B>, user_id: i64) -> Result<Option<Self>, StoreError> {
    let record = store.find(USERS_TABLE, "id", user_id).await?;
    Ok(record.as_ref().map(Self::from_record))
  }

  pub async fn get_by_telegram_id<B: SheetBackend>(
    store: &RowStore<B>,
    telegram_id: i64,
  ) -> Result<Option<Self>, StoreError> {
    let record = store.find(USERS_TABLE, "telegram_id", telegram_id).await?;
    Ok(record.as_ref().map(Self::from_record))
  }

  /// First+last name when both are present, else first name, else username,
  /// else the raw Telegram id.
  pub fn display_name(&self) -> String {
    if !self.first_name.is_empty() && !self.last_name.is_empty() {
      return format!("{} {}", self.first_name, self.last_name);
    }
    if !self.first_name.is_empty() {
      return self.first_name.clone();
    }
    if !self.username.is_empty() {
      return self.username.clone();
    }
    self.telegram_id.to_string()
  }
}
