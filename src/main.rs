mod app;
mod bot;
mod cart;
mod config;
mod models;
mod store;
mod telemetry;
mod util;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  telemetry::init()?;
  let config = config::Config::from_env()?;
  let admin_count = config.admins.len();
  info!(admin_count = admin_count, data_file = %config.data_file.display(), "starting bot");

  let bot = Bot::new(config.bot_token.clone());
  let backend = store::WorkbookBackend::open(&config.data_file).await?;
  let row_store = store::RowStore::open(backend, &models::table_schemas()).await?;
  let app = app::App::new(bot, row_store, config.admins);
  app.run().await
}
