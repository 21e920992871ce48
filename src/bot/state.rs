use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum ConversationState {
  #[default]
  Idle,
  AddProduct(ProductDraft),
}

/// Accumulates a new product across the staged add-product dialogue.
/// Only the admin who started the dialogue may advance it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductDraft {
  pub stage: DraftStage,
  pub admin_tg_id: i64,
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<i64>,
}

impl ProductDraft {
  pub fn new(admin_tg_id: i64) -> Self {
    Self {
      stage: DraftStage::Name,
      admin_tg_id,
      name: None,
      description: None,
      price: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DraftStage {
  Name,
  Description,
  Price,
  Stock,
}
