use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::cart::Cart;
use crate::models::ORDER_ITEMS_TABLE;
use crate::models::ORDERS_TABLE;
use crate::models::Product;
use crate::models::encode_timestamp;
use crate::models::id_field;
use crate::models::int_field;
use crate::models::money_field;
use crate::models::optional_timestamp_field;
use crate::models::text_field;
use crate::models::timestamp_field;
use crate::store::Record;
use crate::store::RowStore;
use crate::store::SheetBackend;
use crate::store::StoreError;
use crate::util::encode_cents;
use crate::util::format_cents;

/// Order lifecycle: `pending → {completed, cancelled}`. `paid` exists in
/// the data and is merged into the pending queue, but no workflow here
/// transitions into or out of it; that ambiguity is inherited deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
  Pending,
  Paid,
  Completed,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Paid => "paid",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  /// Unknown or missing status text coerces to `pending`.
  pub fn parse(text: &str) -> Self {
    match text.trim().to_ascii_lowercase().as_str() {
      "paid" => Self::Paid,
      "completed" => Self::Completed,
      "cancelled" => Self::Cancelled,
      _ => Self::Pending,
    }
  }

  /// Pending and paid orders sit in the same store-side queue.
  pub fn is_open(self) -> bool {
    matches!(self, Self::Pending | Self::Paid)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One line of an order. `product_name`, `price`, and `subtotal` are
/// snapshots taken at order-creation time and are never re-derived from
/// the live product.
#[derive(Debug, Clone)]
pub struct OrderItem {
  pub id: Option<i64>,
  pub order_id: i64,
  pub product_id: i64,
  pub product_name: String,
  pub quantity: i64,
  pub price: i64,
  pub subtotal: i64,
}

impl OrderItem {
  fn snapshot(order_id: i64, product: &Product, quantity: i64) -> Self {
    Self {
      id: None,
      order_id,
      product_id: product.id.unwrap_or(0),
      product_name: product.name.clone(),
      quantity,
      price: product.price,
      subtotal: product.price * quantity,
    }
  }

  pub fn from_record(record: &Record) -> Self {
    Self {
      id: id_field(record),
      order_id: int_field(record, "order_id"),
      product_id: int_field(record, "product_id"),
      product_name: text_field(record, "product_name"),
      quantity: int_field(record, "quantity"),
      price: money_field(record, "price"),
      subtotal: money_field(record, "subtotal"),
    }
  }

  fn to_record(&self) -> Record {
    Record::from([
      ("order_id".to_string(), self.order_id.to_string()),
      ("product_id".to_string(), self.product_id.to_string()),
      ("product_name".to_string(), self.product_name.clone()),
      ("quantity".to_string(), self.quantity.to_string()),
      ("price".to_string(), encode_cents(self.price)),
      ("subtotal".to_string(), encode_cents(self.subtotal)),
    ])
  }

  pub async fn save<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    match self.id {
      Some(id) => {
        let mut fields = self.to_record();
        fields.insert("id".to_string(), id.to_string());
        store.update(ORDER_ITEMS_TABLE, id, fields).await?;
      },
      None => {
        let record = store.insert(ORDER_ITEMS_TABLE, self.to_record()).await?;
        self.id = id_field(&record);
      },
    }
    Ok(())
  }
}

/// One row of the Orders table. `total_amount` is fixed at creation time;
/// `items` is a lazily loaded, non-persistent cache.
#[derive(Debug, Clone)]
pub struct Order {
  pub id: Option<i64>,
  pub user_id: i64,
  pub total_amount: i64,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub items: Vec<OrderItem>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
  #[error("cart is empty")]
  EmptyCart,
  #[error("product {0} not found")]
  ProductMissing(i64),
  #[error("not enough stock for {name}: {available} available")]
  InsufficientStock { name: String, available: i64 },
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl CheckoutError {
  pub fn user_message(&self) -> String {
    match self {
      Self::EmptyCart => "❌ Your cart is empty!".to_string(),
      Self::ProductMissing(_) => "❌ Product not found!".to_string(),
      Self::InsufficientStock { name, available } => {
        format!("❌ Not enough stock for {name}. Available: {available}")
      },
      Self::Store(_) => "❌ Error processing order. Please try again.".to_string(),
    }
  }
}

impl Order {
  fn new(user_id: i64, total_amount: i64) -> Self {
    Self {
      id: None,
      user_id,
      total_amount,
      status: OrderStatus::Pending,
      created_at: Utc::now(),
      completed_at: None,
      items: Vec::new(),
    }
  }

  pub fn from_record(record: &Record) -> Self {
    Self {
      id: id_field(record),
      user_id: int_field(record, "user_id"),
      total_amount: money_field(record, "total_amount"),
      status: OrderStatus::parse(&text_field(record, "status")),
      created_at: timestamp_field(record, "created_at"),
      completed_at: optional_timestamp_field(record, "completed_at"),
      items: Vec::new(),
    }
  }

  fn to_record(&self) -> Record {
    Record::from([
      ("user_id".to_string(), self.user_id.to_string()),
      ("total_amount".to_string(), encode_cents(self.total_amount)),
      ("status".to_string(), self.status.as_str().to_string()),
      ("created_at".to_string(), encode_timestamp(self.created_at)),
      (
        "completed_at".to_string(),
        self.completed_at.map(encode_timestamp).unwrap_or_default(),
      ),
    ])
  }

  pub async fn save<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    match self.id {
      Some(id) => {
        let mut fields = self.to_record();
        fields.insert("id".to_string(), id.to_string());
        store.update(ORDERS_TABLE, id, fields).await?;
      },
      None => {
        let record = store.insert(ORDERS_TABLE, self.to_record()).await?;
        self.id = id_field(&record);
      },
    }
    Ok(())
  }

  pub async fn get_by_id<B: SheetBackend>(store: &RowStore<B>, order_id: i64) -> Result<Option<Self>, StoreError> {
    let record = store.find(ORDERS_TABLE, "id", order_id).await?;
    Ok(record.as_ref().map(Self::from_record))
  }

  /// Loads this order's items into the non-persistent cache.
  pub async fn load_items<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<&[OrderItem], StoreError> {
    let order_id = self.id.unwrap_or(0);
    let records = store.get_all(ORDER_ITEMS_TABLE).await?;
    self.items = records
      .iter()
      .filter(|record| int_field(record, "order_id") == order_id)
      .map(OrderItem::from_record)
      .collect();
    Ok(&self.items)
  }

  pub async fn get_all_completed<B: SheetBackend>(store: &RowStore<B>) -> Result<Vec<Self>, StoreError> {
    let records = store.get_all(ORDERS_TABLE).await?;
    Ok(
      records
        .iter()
        .map(Self::from_record)
        .filter(|order| order.status == OrderStatus::Completed)
        .collect(),
    )
  }

  /// The store-side queue: pending and paid orders together.
  pub async fn get_all_pending<B: SheetBackend>(store: &RowStore<B>) -> Result<Vec<Self>, StoreError> {
    let records = store.get_all(ORDERS_TABLE).await?;
    Ok(
      records
        .iter()
        .map(Self::from_record)
        .filter(|order| order.status.is_open())
        .collect(),
    )
  }

  /// Turns a cart into a pending order.
  ///
  /// Every line is validated against the live product before anything is
  /// written, so a failed check leaves zero records behind. The writes
  /// themselves are not transactional: a backend failure mid-loop can
  /// leave an order without some of its items.
  #[instrument(skip(store, cart))]
  pub async fn checkout<B: SheetBackend>(
    store: &RowStore<B>,
    user_id: i64,
    cart: &Cart,
  ) -> Result<Self, CheckoutError> {
    if cart.is_empty() {
      return Err(CheckoutError::EmptyCart);
    }

    let mut validated: Vec<(Product, i64)> = Vec::new();
    for (product_id, quantity) in cart.lines() {
      let product = Product::get_by_id(store, product_id)
        .await?
        .ok_or(CheckoutError::ProductMissing(product_id))?;
      if product.stock < quantity {
        return Err(CheckoutError::InsufficientStock {
          name: product.name,
          available: product.stock,
        });
      }
      validated.push((product, quantity));
    }

    let total_amount = validated
      .iter()
      .map(|(product, quantity)| product.price * quantity)
      .sum();

    let mut order = Self::new(user_id, total_amount);
    order.save(store).await?;
    let order_id = order.id.unwrap_or(0);

    for (product, quantity) in &validated {
      let mut item = OrderItem::snapshot(order_id, product, *quantity);
      item.save(store).await?;
      order.items.push(item);
    }

    info!(
      order_id,
      user_id,
      total = %format_cents(total_amount),
      line_count = order.items.len(),
      "order created"
    );
    Ok(order)
  }

  /// Marks the order completed and decrements the current stock of each
  /// item's product by the ordered quantity, floored at zero. Stock may
  /// have changed since the order was created; the floor keeps it from
  /// ever going negative.
  #[instrument(skip(self, store))]
  pub async fn complete<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    self.status = OrderStatus::Completed;
    self.completed_at = Some(Utc::now());
    self.save(store).await?;

    self.load_items(store).await?;
    for item in self.items.clone() {
      match Product::get_by_id(store, item.product_id).await? {
        Some(mut product) => {
          product.stock = (product.stock - item.quantity).max(0);
          product.save(store).await?;
        },
        None => {
          warn!(
            order_id = self.id,
            product_id = item.product_id,
            "ordered product no longer exists, skipping stock decrement"
          );
        },
      }
    }

    info!(order_id = self.id, "order completed");
    Ok(())
  }

  /// Marks the order cancelled. Stock is untouched: decrement only happens
  /// at completion time.
  #[instrument(skip(self, store))]
  pub async fn cancel<B: SheetBackend>(&mut self, store: &RowStore<B>) -> Result<(), StoreError> {
    self.status = OrderStatus::Cancelled;
    self.save(store).await?;
    info!(order_id = self.id, "order cancelled");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::CheckoutError;
  use super::Order;
  use super::OrderStatus;
  use crate::cart::Cart;
  use crate::models::ORDER_ITEMS_TABLE;
  use crate::models::ORDERS_TABLE;
  use crate::models::Product;
  use crate::models::table_schemas;
  use crate::store::RowStore;
  use crate::store::memory::MemoryBackend;

  async fn store() -> RowStore<MemoryBackend> {
    RowStore::open(MemoryBackend::new(), &table_schemas()).await.unwrap()
  }

  async fn seeded_product(store: &RowStore<MemoryBackend>, price: i64, stock: i64) -> i64 {
    let mut product = Product::new("Latte", "", price, stock);
    product.save(store).await.unwrap();
    product.id.unwrap()
  }

  #[test]
  fn unknown_status_coerces_to_pending() {
    assert_eq!(OrderStatus::parse("PAID"), OrderStatus::Paid);
    assert_eq!(OrderStatus::parse("refunded"), OrderStatus::Pending);
    assert_eq!(OrderStatus::parse(""), OrderStatus::Pending);
  }

  #[tokio::test]
  async fn checkout_snapshots_prices_and_totals() {
    let store = store().await;
    let product_id = seeded_product(&store, 1250, 2).await;

    let mut cart = Cart::new();
    cart.add(product_id);
    cart.add(product_id);

    let order = Order::checkout(&store, 1, &cart).await.unwrap();
    assert_eq!(order.total_amount, 2500);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price, 1250);
    assert_eq!(order.items[0].subtotal, 2500);
    assert_eq!(order.items[0].product_name, "Latte");
  }

  #[tokio::test]
  async fn checkout_rejects_empty_cart() {
    let store = store().await;
    let err = Order::checkout(&store, 1, &Cart::new()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));
  }

  #[tokio::test]
  async fn failed_stock_check_writes_nothing() {
    let store = store().await;
    let product_id = seeded_product(&store, 1250, 1).await;

    let mut cart = Cart::new();
    cart.add(product_id);
    cart.add(product_id);

    let err = Order::checkout(&store, 1, &cart).await.unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));
    assert!(store.get_all(ORDERS_TABLE).await.unwrap().is_empty());
    assert!(store.get_all(ORDER_ITEMS_TABLE).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn totals_are_immune_to_later_price_changes() {
    let store = store().await;
    let product_id = seeded_product(&store, 1250, 5).await;

    let mut cart = Cart::new();
    cart.add(product_id);
    let order = Order::checkout(&store, 1, &cart).await.unwrap();

    let mut product = Product::get_by_id(&store, product_id).await.unwrap().unwrap();
    product.price = 9900;
    product.name = "Deluxe Latte".to_string();
    product.save(&store).await.unwrap();

    let mut reloaded = Order::get_by_id(&store, order.id.unwrap()).await.unwrap().unwrap();
    reloaded.load_items(&store).await.unwrap();
    assert_eq!(reloaded.total_amount, 1250);
    assert_eq!(reloaded.items[0].price, 1250);
    assert_eq!(reloaded.items[0].product_name, "Latte");
  }

  #[tokio::test]
  async fn completing_decrements_stock_floored_at_zero() {
    let store = store().await;
    let product_id = seeded_product(&store, 1250, 2).await;

    let mut cart = Cart::new();
    cart.add(product_id);
    cart.add(product_id);
    let order = Order::checkout(&store, 1, &cart).await.unwrap();

    // stock shrank between checkout and completion
    let mut product = Product::get_by_id(&store, product_id).await.unwrap().unwrap();
    product.stock = 1;
    product.save(&store).await.unwrap();

    let mut order = Order::get_by_id(&store, order.id.unwrap()).await.unwrap().unwrap();
    order.complete(&store).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.completed_at.is_some());

    let product = Product::get_by_id(&store, product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);

    let reloaded = Order::get_by_id(&store, order.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatus::Completed);
    assert!(reloaded.completed_at.is_some());
  }

  #[tokio::test]
  async fn cancelling_leaves_stock_alone() {
    let store = store().await;
    let product_id = seeded_product(&store, 500, 3).await;

    let mut cart = Cart::new();
    cart.add(product_id);
    let mut order = Order::checkout(&store, 1, &cart).await.unwrap();
    order.cancel(&store).await.unwrap();

    let product = Product::get_by_id(&store, product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);

    let reloaded = Order::get_by_id(&store, order.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(reloaded.status, OrderStatus::Cancelled);
    assert!(reloaded.completed_at.is_none());
  }

  #[tokio::test]
  async fn pending_queue_merges_paid_orders() {
    let store = store().await;
    for status in [
      OrderStatus::Pending,
      OrderStatus::Paid,
      OrderStatus::Completed,
      OrderStatus::Cancelled,
    ] {
      let mut order = Order::new(1, 100);
      order.status = status;
      order.save(&store).await.unwrap();
    }

    let pending = Order::get_all_pending(&store).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|order| order.status.is_open()));

    let completed = Order::get_all_completed(&store).await.unwrap();
    assert_eq!(completed.len(), 1);
  }
}
