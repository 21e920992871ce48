use std::collections::BTreeMap;

/// Per-conversation shopping cart: product id → requested quantity. Held
/// only in process memory; a restart loses all carts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
  lines: BTreeMap<i64, i64>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds one unit and returns the new quantity for the product.
  pub fn add(&mut self, product_id: i64) -> i64 {
    let quantity = self.lines.entry(product_id).or_insert(0);
    *quantity += 1;
    *quantity
  }

  pub fn quantity(&self, product_id: i64) -> i64 {
    self.lines.get(&product_id).copied().unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn line_count(&self) -> usize {
    self.lines.len()
  }

  pub fn clear(&mut self) {
    self.lines.clear();
  }

  pub fn lines(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
    self.lines.iter().map(|(product_id, quantity)| (*product_id, *quantity))
  }
}

#[cfg(test)]
mod tests {
  use super::Cart;

  #[test]
  fn adding_increments_per_product() {
    let mut cart = Cart::new();
    assert_eq!(cart.add(1), 1);
    assert_eq!(cart.add(1), 2);
    assert_eq!(cart.add(2), 1);
    assert_eq!(cart.quantity(1), 2);
    assert_eq!(cart.line_count(), 2);
  }

  #[test]
  fn clearing_empties_the_cart() {
    let mut cart = Cart::new();
    cart.add(5);
    cart.clear();
    assert!(cart.is_empty());
    assert_eq!(cart.quantity(5), 0);
  }

  #[test]
  fn lines_iterate_in_product_order() {
    let mut cart = Cart::new();
    cart.add(9);
    cart.add(3);
    cart.add(3);
    let lines: Vec<(i64, i64)> = cart.lines().collect();
    assert_eq!(lines, vec![(3, 2), (9, 1)]);
  }
}
