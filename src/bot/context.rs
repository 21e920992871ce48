use std::collections::HashMap;
use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::cart::Cart;
use crate::store::RowStore;
use crate::store::SheetBackend;

/// Shared per-process state: the row store, the configured admin list, and
/// the in-memory carts keyed by Telegram user id.
pub struct AppContext<B: SheetBackend> {
  store: RowStore<B>,
  admins: HashSet<i64>,
  carts: Mutex<HashMap<i64, Cart>>,
}

impl<B: SheetBackend> AppContext<B> {
  pub fn new(store: RowStore<B>, admins: Vec<i64>) -> Self {
    Self {
      store,
      admins: admins.into_iter().collect(),
      carts: Mutex::new(HashMap::new()),
    }
  }

  pub fn store(&self) -> &RowStore<B> {
    &self.store
  }

  /// Whether the id is on the environment-configured admin list. Stored
  /// admin flags are checked separately by the handlers.
  pub fn is_configured_admin(&self, tg_id: i64) -> bool {
    self.admins.contains(&tg_id)
  }

  /// Adds one unit to the user's cart and returns the new quantity.
  pub async fn add_to_cart(&self, tg_id: i64, product_id: i64) -> i64 {
    let mut carts = self.carts.lock().await;
    carts.entry(tg_id).or_default().add(product_id)
  }

  pub async fn cart_snapshot(&self, tg_id: i64) -> Cart {
    let carts = self.carts.lock().await;
    carts.get(&tg_id).cloned().unwrap_or_default()
  }

  pub async fn clear_cart(&self, tg_id: i64) {
    let mut carts = self.carts.lock().await;
    carts.remove(&tg_id);
  }

  /// Removes and returns the user's cart, leaving it empty. Used at
  /// checkout so a successful order cannot be submitted twice.
  pub async fn take_cart(&self, tg_id: i64) -> Cart {
    let mut carts = self.carts.lock().await;
    carts.remove(&tg_id).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::AppContext;
  use crate::models::table_schemas;
  use crate::store::RowStore;
  use crate::store::memory::MemoryBackend;

  async fn context() -> AppContext<MemoryBackend> {
    let store = RowStore::open(MemoryBackend::new(), &table_schemas()).await.unwrap();
    AppContext::new(store, vec![10])
  }

  #[tokio::test]
  async fn carts_are_isolated_per_user() {
    let ctx = context().await;
    assert_eq!(ctx.add_to_cart(1, 5).await, 1);
    assert_eq!(ctx.add_to_cart(1, 5).await, 2);
    assert_eq!(ctx.add_to_cart(2, 5).await, 1);

    assert_eq!(ctx.cart_snapshot(1).await.quantity(5), 2);
    assert_eq!(ctx.cart_snapshot(2).await.quantity(5), 1);
  }

  #[tokio::test]
  async fn take_cart_leaves_nothing_behind() {
    let ctx = context().await;
    ctx.add_to_cart(1, 5).await;
    let taken = ctx.take_cart(1).await;
    assert_eq!(taken.quantity(5), 1);
    assert!(ctx.cart_snapshot(1).await.is_empty());
  }

  #[tokio::test]
  async fn configured_admins_come_from_the_list() {
    let ctx = context().await;
    assert!(ctx.is_configured_admin(10));
    assert!(!ctx.is_configured_admin(11));
  }
}
