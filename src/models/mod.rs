//! Typed views over row-store records.
//!
//! Models are built either from fresh input (no id yet) or from a loaded
//! record (id present). Construction from a record coerces text cells back
//! into typed fields with lenient defaults: broken numbers become 0,
//! missing timestamps become "now".

mod order;
mod product;
mod user;

pub use order::CheckoutError;
pub use order::Order;
pub use order::OrderItem;
pub use order::OrderStatus;
pub use product::Product;
pub use user::User;

use chrono::DateTime;
use chrono::Utc;

use crate::store::Record;
use crate::util::parse_money_to_cents;

pub const USERS_TABLE: &str = "Users";
pub const PRODUCTS_TABLE: &str = "Products";
pub const ORDERS_TABLE: &str = "Orders";
pub const ORDER_ITEMS_TABLE: &str = "OrderItems";

/// The persisted layout: four tables with fixed column order, used to
/// initialize the row store at startup.
pub fn table_schemas() -> [(&'static str, &'static [&'static str]); 4] {
  [
    (USERS_TABLE, &[
      "id",
      "telegram_id",
      "username",
      "first_name",
      "last_name",
      "is_admin",
      "created_at",
    ]),
    (PRODUCTS_TABLE, &[
      "id",
      "name",
      "description",
      "price",
      "stock",
      "is_available",
      "created_at",
      "updated_at",
    ]),
    (ORDERS_TABLE, &[
      "id",
      "user_id",
      "total_amount",
      "status",
      "created_at",
      "completed_at",
    ]),
    (ORDER_ITEMS_TABLE, &[
      "id",
      "order_id",
      "product_id",
      "product_name",
      "quantity",
      "price",
      "subtotal",
    ]),
  ]
}

pub(crate) fn text_field(record: &Record, key: &str) -> String {
  record.get(key).cloned().unwrap_or_default()
}

pub(crate) fn int_field(record: &Record, key: &str) -> i64 {
  record
    .get(key)
    .and_then(|value| value.trim().parse::<i64>().ok())
    .unwrap_or(0)
}

pub(crate) fn id_field(record: &Record) -> Option<i64> {
  record
    .get("id")
    .and_then(|value| value.trim().parse::<i64>().ok())
    .filter(|id| *id > 0)
}

pub(crate) fn bool_field(record: &Record, key: &str) -> bool {
  record
    .get(key)
    .map(|value| value.trim().eq_ignore_ascii_case("true"))
    .unwrap_or(false)
}

pub(crate) fn money_field(record: &Record, key: &str) -> i64 {
  record
    .get(key)
    .and_then(|value| parse_money_to_cents(value).ok())
    .unwrap_or(0)
}

pub(crate) fn timestamp_field(record: &Record, key: &str) -> DateTime<Utc> {
  optional_timestamp_field(record, key).unwrap_or_else(Utc::now)
}

pub(crate) fn optional_timestamp_field(record: &Record, key: &str) -> Option<DateTime<Utc>> {
  record
    .get(key)
    .filter(|value| !value.trim().is_empty())
    .and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
    .map(|value| value.with_timezone(&Utc))
}

pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
  value.to_rfc3339()
}

#[cfg(test)]
mod tests {
  use super::bool_field;
  use super::int_field;
  use super::money_field;
  use super::optional_timestamp_field;
  use crate::store::Record;

  fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
      .iter()
      .map(|(key, value)| (key.to_string(), value.to_string()))
      .collect()
  }

  #[test]
  fn broken_numbers_default_to_zero() {
    let record = record(&[("stock", "lots"), ("price", "cheap")]);
    assert_eq!(int_field(&record, "stock"), 0);
    assert_eq!(money_field(&record, "price"), 0);
    assert_eq!(int_field(&record, "missing"), 0);
  }

  #[test]
  fn booleans_parse_case_insensitively() {
    let record = record(&[("is_admin", "True"), ("is_available", "no")]);
    assert!(bool_field(&record, "is_admin"));
    assert!(!bool_field(&record, "is_available"));
    assert!(!bool_field(&record, "missing"));
  }

  #[test]
  fn empty_timestamp_is_absent() {
    let record = record(&[("completed_at", ""), ("created_at", "2026-01-05T10:00:00+00:00")]);
    assert!(optional_timestamp_field(&record, "completed_at").is_none());
    assert!(optional_timestamp_field(&record, "created_at").is_some());
  }
}
