use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use futures::future::join_all;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::dispatching::UpdateHandler;
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::Message;
use teloxide::types::MessageId;
use teloxide::types::User as TgUser;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::bot::Command;
use crate::bot::DialogueStorage;
use crate::bot::HandlerResult;
use crate::bot::context::AppContext;
use crate::bot::state::ConversationState;
use crate::bot::state::DraftStage;
use crate::bot::state::ProductDraft;
use crate::cart::Cart;
use crate::models::CheckoutError;
use crate::models::Order;
use crate::models::Product;
use crate::models::User;
use crate::store::StoreError;
use crate::store::WorkbookBackend;
use crate::util::format_cents;
use crate::util::parse_money_to_cents;

type SharedContext = Arc<AppContext<WorkbookBackend>>;
type BotDialogue = Dialogue<ConversationState, DialogueStorage>;

const MAIN_MENU_TEXT: &str = "🛍️ Welcome! What would you like to do?";

pub fn build_schema() -> UpdateHandler<anyhow::Error> {
  let message_handler = Update::filter_message()
    .enter_dialogue::<Message, DialogueStorage, ConversationState>()
    .branch(command_branch())
    .branch(dptree::case![ConversationState::AddProduct(draft)].endpoint(handle_add_product_message))
    .branch(dptree::endpoint(handle_idle_text));

  let callback_handler = Update::filter_callback_query()
    .enter_dialogue::<CallbackQuery, DialogueStorage, ConversationState>()
    .endpoint(handle_callback_query);

  dptree::entry().branch(message_handler).branch(callback_handler)
}

fn command_branch() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .filter_command::<Command>()
    .branch(dptree::case![Command::Start].endpoint(handle_start))
    .branch(dptree::case![Command::Help].endpoint(handle_help))
}

#[instrument(skip(bot, ctx, dialogue, msg))]
async fn handle_start(bot: Bot, dialogue: BotDialogue, ctx: SharedContext, msg: Message) -> HandlerResult {
  dialogue.reset().await?;
  let tg_user = msg.from.as_ref().context("message missing sender")?;
  let user = ensure_user_record(&ctx, tg_user).await?;
  let user_id = tg_user.id.0 as i64;
  let username = tg_user.username.as_deref().unwrap_or("-");
  info!(user_id, chat_id = %msg.chat.id, username, "received /start command");
  bot
    .send_message(msg.chat.id, MAIN_MENU_TEXT)
    .reply_markup(main_menu_keyboard(is_admin(&ctx, &user)))
    .await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
  info!(chat_id = %msg.chat.id, "received /help command");
  let mut text = Command::descriptions().to_string();
  text.push_str("\n\nBrowse products, fill your cart, and check out from the on-screen menu buttons. Use /start to open the menu again.");
  bot.send_message(msg.chat.id, text).await?;
  Ok(())
}

#[instrument(skip(bot, msg))]
async fn handle_idle_text(bot: Bot, msg: Message, state: ConversationState) -> HandlerResult {
  if matches!(state, ConversationState::Idle)
    && let Some(text) = msg.text()
  {
    if text.starts_with('/') {
      // unknown command, ignore to let telegram handle
    } else {
      info!(chat_id = %msg.chat.id, "idle state received unrecognized message");
      bot
        .send_message(msg.chat.id, "I did not understand that. Use the menu buttons or /help.")
        .await?;
    }
  }
  Ok(())
}

#[instrument(skip(bot, ctx, dialogue, msg, draft))]
async fn handle_add_product_message(
  bot: Bot,
  dialogue: BotDialogue,
  ctx: SharedContext,
  msg: Message,
  mut draft: ProductDraft,
) -> HandlerResult {
  let tg_user = msg.from.as_ref().context("message missing sender")?;
  if tg_user.id.0 as i64 != draft.admin_tg_id {
    bot
      .send_message(msg.chat.id, "Only the admin who started this product creation can respond.")
      .await?;
    return Ok(());
  }

  let chat_id = msg.chat.id;
  let Some(text) = message_text(&msg).map(|t| t.trim()).filter(|t| !t.is_empty()) else {
    bot
      .send_message(chat_id, "✏️ Send a text reply, or type cancel to stop.")
      .await?;
    return Ok(());
  };

  info!(
    admin_tg_id = draft.admin_tg_id,
    chat_id = %chat_id,
    stage = ?draft.stage,
    "handling add product input"
  );

  if text.eq_ignore_ascii_case("cancel") {
    dialogue.reset().await?;
    bot.send_message(chat_id, "❌ Product creation cancelled.").await?;
    return Ok(());
  }

  match draft.stage {
    DraftStage::Name => {
      draft.name = Some(text.to_string());
      draft.stage = DraftStage::Description;
      dialogue.update(ConversationState::AddProduct(draft)).await?;
      bot
        .send_message(chat_id, "🧾 Enter description (or '-' to skip):")
        .await?;
    },
    DraftStage::Description => {
      draft.description = Some(if text == "-" { String::new() } else { text.to_string() });
      draft.stage = DraftStage::Price;
      dialogue.update(ConversationState::AddProduct(draft)).await?;
      bot.send_message(chat_id, "💰 Enter price (e.g., 12.50):").await?;
    },
    DraftStage::Price => match parse_money_to_cents(text) {
      Ok(value) => {
        draft.price = Some(value);
        draft.stage = DraftStage::Stock;
        dialogue.update(ConversationState::AddProduct(draft)).await?;
        bot.send_message(chat_id, "📦 Enter stock quantity:").await?;
      },
      Err(err) => {
        bot.send_message(chat_id, format!("⚠️ Invalid price: {err}")).await?;
      },
    },
    DraftStage::Stock => {
      let stock: i64 = match text.parse() {
        Ok(value) if value >= 0 => value,
        _ => {
          bot
            .send_message(chat_id, "🔢 Provide a whole stock quantity of 0 or more.")
            .await?;
          return Ok(());
        },
      };

      let name = draft.name.as_deref().context("missing name during draft completion")?;
      let description = draft.description.as_deref().unwrap_or_default();
      let price = draft.price.context("missing price during draft completion")?;

      let mut product = Product::new(name, description, price, stock);
      product.save(ctx.store()).await?;
      dialogue.reset().await?;

      info!(
        admin_tg_id = draft.admin_tg_id,
        product_id = product.id,
        stock,
        "product created"
      );
      bot
        .send_message(
          chat_id,
          format!(
            "✅ Product created: {} (#{}) — {}, {} in stock.",
            product.name,
            product.id.unwrap_or(0),
            format_cents(product.price),
            product.stock
          ),
        )
        .await?;
    },
  }

  Ok(())
}

#[instrument(skip(bot, ctx, dialogue, query))]
async fn handle_callback_query(
  bot: Bot,
  ctx: SharedContext,
  query: CallbackQuery,
  dialogue: BotDialogue,
) -> HandlerResult {
  let user = ensure_user_record(&ctx, &query.from).await?;
  let admin = is_admin(&ctx, &user);
  let user_id = query.from.id.0 as i64;
  let mut callback_text: Option<String> = None;
  let message_ctx = query.message.as_ref().map(|message| (message.chat().id, message.id()));
  let callback_data = query.data.as_deref().unwrap_or("<empty>");
  if let Some((chat_id, _)) = message_ctx {
    info!(user_id, chat_id = %chat_id, callback = callback_data, "handling callback query");
  } else {
    info!(user_id, callback = callback_data, "handling callback query without message context");
  }

  if let Some(data) = query.data.as_deref()
    && let Some((prefix, value)) = data.split_once(':')
  {
    match prefix {
      "menu" => match value {
        "root" => {
          dialogue.reset().await?;
          if let Some((chat_id, message_id)) = message_ctx {
            edit_or_keep(&bot, chat_id, message_id, MAIN_MENU_TEXT.to_string(), main_menu_keyboard(admin)).await?;
          }
        },
        "browse" => {
          dialogue.reset().await?;
          if let Some((chat_id, message_id)) = message_ctx {
            show_browse_menu(&bot, &ctx, chat_id, message_id).await?;
          }
        },
        "cart" => {
          if let Some((chat_id, message_id)) = message_ctx {
            show_cart_view(&bot, &ctx, chat_id, message_id, user_id).await?;
          }
        },
        "admin" => {
          if admin {
            dialogue.reset().await?;
            if let Some((chat_id, message_id)) = message_ctx {
              show_admin_menu(&bot, chat_id, message_id).await?;
            }
          } else {
            callback_text = Some("🛡️ Admins only.".to_string());
          }
        },
        _ => {},
      },
      "product" => {
        if let Ok(product_id) = value.parse::<i64>()
          && let Some((chat_id, message_id)) = message_ctx
          && !show_product_detail(&bot, &ctx, chat_id, message_id, user_id, product_id).await?
        {
          callback_text = Some("❓ Product not found".to_string());
        }
      },
      "cart" => match value.split_once(':') {
        Some(("add", id_str)) => {
          if let Ok(product_id) = id_str.parse::<i64>() {
            callback_text = Some(add_product_to_cart(&ctx, user_id, product_id).await?);
          }
        },
        _ => match value {
          "clear" => {
            ctx.clear_cart(user_id).await;
            if let Some((chat_id, message_id)) = message_ctx {
              show_cart_view(&bot, &ctx, chat_id, message_id, user_id).await?;
            }
            callback_text = Some("🗑 Cart cleared.".to_string());
          },
          "checkout" => {
            if let Some((chat_id, _)) = message_ctx {
              callback_text = Some(run_checkout(&bot, &ctx, chat_id, user_id, &user).await?);
            }
          },
          _ => {},
        },
      },
      "admin" => {
        if !admin {
          callback_text = Some("🛡️ Admins only.".to_string());
        } else {
          match value.split_once(':') {
            Some(("edit", id_str)) => {
              if let Ok(product_id) = id_str.parse::<i64>()
                && let Some((chat_id, message_id)) = message_ctx
                && !show_admin_product_edit(&bot, &ctx, chat_id, message_id, product_id).await?
              {
                callback_text = Some("❓ Product not found".to_string());
              }
            },
            Some(("toggle", id_str)) => {
              if let Ok(product_id) = id_str.parse::<i64>() {
                match Product::get_by_id(ctx.store(), product_id).await? {
                  Some(mut product) => {
                    product.is_available = !product.is_available;
                    product.save(ctx.store()).await?;
                    info!(
                      admin_tg_id = user_id,
                      product_id,
                      is_available = product.is_available,
                      "toggled product availability"
                    );
                    if let Some((chat_id, message_id)) = message_ctx {
                      show_admin_product_edit(&bot, &ctx, chat_id, message_id, product_id).await?;
                    }
                    callback_text = Some(if product.is_available {
                      format!("✅ {} is now available.", product.name)
                    } else {
                      format!("🚫 {} is now hidden.", product.name)
                    });
                  },
                  None => {
                    callback_text = Some("❓ Product not found".to_string());
                  },
                }
              }
            },
            _ => match value {
              "panel" => {
                dialogue.reset().await?;
                if let Some((chat_id, message_id)) = message_ctx {
                  show_admin_menu(&bot, chat_id, message_id).await?;
                }
              },
              "add_product" => {
                dialogue.reset().await?;
                dialogue
                  .update(ConversationState::AddProduct(ProductDraft::new(user_id)))
                  .await?;
                if let Some((chat_id, _)) = message_ctx {
                  bot
                    .send_message(chat_id, "📝 Enter product name (or type cancel to stop):")
                    .await?;
                }
                callback_text = Some("📝 Waiting for product name.".to_string());
              },
              "products" => {
                if let Some((chat_id, message_id)) = message_ctx {
                  show_admin_products(&bot, &ctx, chat_id, message_id).await?;
                }
              },
              "queue" => {
                if let Some((chat_id, message_id)) = message_ctx {
                  show_order_queue(&bot, &ctx, chat_id, message_id).await?;
                }
              },
              "sales" => {
                if let Some((chat_id, message_id)) = message_ctx {
                  show_sales_stats(&bot, &ctx, chat_id, message_id).await?;
                }
              },
              _ => {},
            },
          }
        }
      },
      "order" => {
        if !admin {
          callback_text = Some("🛡️ Admins only.".to_string());
        } else if let Some((action, id_str)) = value.split_once(':')
          && let Ok(order_id) = id_str.parse::<i64>()
        {
          match action {
            "view" => {
              if let Some((chat_id, message_id)) = message_ctx
                && !show_order_detail(&bot, &ctx, chat_id, message_id, order_id).await?
              {
                callback_text = Some("❓ Order not found".to_string());
              }
            },
            "complete" => {
              callback_text = Some(close_order(&ctx, user_id, order_id, true).await?);
              if let Some((chat_id, message_id)) = message_ctx {
                show_order_queue(&bot, &ctx, chat_id, message_id).await?;
              }
            },
            "cancel" => {
              callback_text = Some(close_order(&ctx, user_id, order_id, false).await?);
              if let Some((chat_id, message_id)) = message_ctx {
                show_order_queue(&bot, &ctx, chat_id, message_id).await?;
              }
            },
            _ => {},
          }
        }
      },
      _ => {},
    }
  }

  if let Some(text) = callback_text {
    bot.answer_callback_query(query.id).text(text).await?;
  } else {
    bot.answer_callback_query(query.id).await?;
  }
  Ok(())
}

/// Loads the stored user for a Telegram sender, creating the record on
/// first contact. The stored admin flag is seeded from the configured
/// admin list at creation time.
async fn ensure_user_record(ctx: &SharedContext, tg_user: &TgUser) -> Result<User> {
  let telegram_id = tg_user.id.0 as i64;
  if let Some(user) = User::get_by_telegram_id(ctx.store(), telegram_id).await? {
    return Ok(user);
  }

  let mut user = User::new(
    telegram_id,
    tg_user.username.as_deref(),
    &tg_user.first_name,
    tg_user.last_name.as_deref(),
    ctx.is_configured_admin(telegram_id),
  );
  user.save(ctx.store()).await.context("failed to create user record")?;
  info!(telegram_id, user_id = user.id, "created user record");
  Ok(user)
}

/// Admin rights come from either the configured list or the stored flag.
fn is_admin(ctx: &SharedContext, user: &User) -> bool {
  user.is_admin || ctx.is_configured_admin(user.telegram_id)
}

async fn add_product_to_cart(ctx: &SharedContext, user_id: i64, product_id: i64) -> Result<String> {
  let Some(product) = Product::get_by_id(ctx.store(), product_id).await? else {
    return Ok("❓ Product not found".to_string());
  };
  if !product.is_available || product.stock <= 0 {
    return Ok(format!("🚫 {} is out of stock.", product.name));
  }

  let in_cart = ctx.cart_snapshot(user_id).await.quantity(product_id);
  if in_cart >= product.stock {
    return Ok(format!("🚫 Only {} of {} in stock.", product.stock, product.name));
  }

  let quantity = ctx.add_to_cart(user_id, product_id).await;
  info!(user_id, product_id, quantity, "added product to cart");
  Ok(format!("🛒 {} added ({})", product.name, quantity))
}

async fn run_checkout(bot: &Bot, ctx: &SharedContext, chat: ChatId, user_id: i64, user: &User) -> Result<String> {
  let cart = ctx.cart_snapshot(user_id).await;
  let store_user_id = user.id.unwrap_or(0);

  match Order::checkout(ctx.store(), store_user_id, &cart).await {
    Ok(order) => {
      ctx.take_cart(user_id).await;
      info!(user_id, order_id = order.id, "checkout complete");
      bot.send_message(chat, render_receipt(&order)).await?;
      Ok("✅ Order placed.".to_string())
    },
    Err(CheckoutError::Store(err)) => {
      warn!(error = %err, user_id, "checkout failed on storage");
      bot
        .send_message(chat, CheckoutError::Store(err).user_message())
        .await?;
      Ok("⚠️ Checkout failed.".to_string())
    },
    Err(err) => {
      bot.send_message(chat, err.user_message()).await?;
      Ok("⚠️ Checkout failed.".to_string())
    },
  }
}

async fn close_order(ctx: &SharedContext, admin_tg_id: i64, order_id: i64, complete: bool) -> Result<String> {
  let Some(mut order) = Order::get_by_id(ctx.store(), order_id).await? else {
    return Ok("❓ Order not found".to_string());
  };
  if !order.status.is_open() {
    return Ok(format!("ℹ️ Order #{order_id} is already {}.", order.status));
  }

  if complete {
    order.complete(ctx.store()).await?;
    info!(admin_tg_id, order_id, "order completed by admin");
    Ok(format!("✅ Order #{order_id} completed."))
  } else {
    order.cancel(ctx.store()).await?;
    info!(admin_tg_id, order_id, "order cancelled by admin");
    Ok(format!("❌ Order #{order_id} cancelled."))
  }
}

async fn edit_or_keep(
  bot: &Bot,
  chat: ChatId,
  message_id: MessageId,
  text: String,
  keyboard: InlineKeyboardMarkup,
) -> HandlerResult {
  let request = bot.edit_message_text(chat, message_id, text).reply_markup(keyboard);
  match request.await {
    Ok(_) => Ok(()),
    Err(RequestError::Api(ApiError::MessageNotModified)) => {
      info!(chat_id = %chat, message_id = %message_id, "message already current");
      Ok(())
    },
    Err(err) => Err(err.into()),
  }
}

#[instrument(skip(bot, ctx))]
async fn show_browse_menu(bot: &Bot, ctx: &SharedContext, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let products = Product::get_all(ctx.store(), true).await?;
  if products.is_empty() {
    info!(chat_id = %chat, "no products to browse");
    edit_or_keep(
      bot,
      chat,
      message_id,
      "🛍️ No products are available right now. Check back soon.".to_string(),
      main_menu_only_keyboard(),
    )
    .await
  } else {
    info!(chat_id = %chat, count = products.len(), "rendering product listing");
    edit_or_keep(
      bot,
      chat,
      message_id,
      "🛍️ Choose a product:".to_string(),
      products_keyboard(&products),
    )
    .await
  }
}

#[instrument(skip(bot, ctx))]
async fn show_product_detail(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
  product_id: i64,
) -> Result<bool> {
  let Some(product) = Product::get_by_id(ctx.store(), product_id).await? else {
    return Ok(false);
  };
  let in_cart = ctx.cart_snapshot(user_id).await.quantity(product_id);
  edit_or_keep(
    bot,
    chat,
    message_id,
    render_product_detail(&product, in_cart),
    product_detail_keyboard(&product),
  )
  .await?;
  Ok(true)
}

#[instrument(skip(bot, ctx))]
async fn show_cart_view(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  user_id: i64,
) -> HandlerResult {
  let cart = ctx.cart_snapshot(user_id).await;
  let lines = load_cart_lines(ctx, &cart).await?;
  info!(user_id, chat_id = %chat, line_count = lines.len(), "rendering cart");
  edit_or_keep(bot, chat, message_id, render_cart(&lines), cart_keyboard(lines.is_empty())).await
}

#[instrument(skip(bot))]
async fn show_admin_menu(bot: &Bot, chat: ChatId, message_id: MessageId) -> HandlerResult {
  edit_or_keep(
    bot,
    chat,
    message_id,
    "🛡️ Admin panel\n\nChoose an action:".to_string(),
    admin_menu_keyboard(),
  )
  .await
}

#[instrument(skip(bot, ctx))]
async fn show_admin_products(bot: &Bot, ctx: &SharedContext, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let products = Product::get_all(ctx.store(), false).await?;
  let text = if products.is_empty() {
    "📦 No products yet.".to_string()
  } else {
    info!(chat_id = %chat, count = products.len(), "rendering admin product listing");
    "📦 Tap a product to manage it:".to_string()
  };
  edit_or_keep(bot, chat, message_id, text, admin_products_keyboard(&products)).await
}

#[instrument(skip(bot, ctx))]
async fn show_admin_product_edit(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  product_id: i64,
) -> Result<bool> {
  let Some(product) = Product::get_by_id(ctx.store(), product_id).await? else {
    return Ok(false);
  };
  edit_or_keep(
    bot,
    chat,
    message_id,
    render_admin_product_detail(&product),
    admin_edit_keyboard(&product),
  )
  .await?;
  Ok(true)
}

#[instrument(skip(bot, ctx))]
async fn show_sales_stats(bot: &Bot, ctx: &SharedContext, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let completed = Order::get_all_completed(ctx.store()).await?;
  let revenue: i64 = completed.iter().map(|order| order.total_amount).sum();
  info!(chat_id = %chat, completed = completed.len(), "rendering sales stats");
  edit_or_keep(
    bot,
    chat,
    message_id,
    render_sales_summary(completed.len(), revenue),
    admin_back_keyboard(),
  )
  .await
}

#[instrument(skip(bot, ctx))]
async fn show_order_queue(bot: &Bot, ctx: &SharedContext, chat: ChatId, message_id: MessageId) -> HandlerResult {
  let pending = Order::get_all_pending(ctx.store()).await?;
  if pending.is_empty() {
    edit_or_keep(
      bot,
      chat,
      message_id,
      "📋 The order queue is empty.".to_string(),
      admin_back_keyboard(),
    )
    .await
  } else {
    info!(chat_id = %chat, count = pending.len(), "rendering order queue");
    edit_or_keep(
      bot,
      chat,
      message_id,
      format!("📋 Open orders ({}):", pending.len()),
      queue_keyboard(&pending),
    )
    .await
  }
}

#[instrument(skip(bot, ctx))]
async fn show_order_detail(
  bot: &Bot,
  ctx: &SharedContext,
  chat: ChatId,
  message_id: MessageId,
  order_id: i64,
) -> Result<bool> {
  let Some(mut order) = Order::get_by_id(ctx.store(), order_id).await? else {
    return Ok(false);
  };
  order.load_items(ctx.store()).await?;
  let customer = match User::get_by_id(ctx.store(), order.user_id).await? {
    Some(user) => user.display_name(),
    None => "unknown".to_string(),
  };
  let open = order.status.is_open();
  edit_or_keep(
    bot,
    chat,
    message_id,
    render_order_detail(&order, &customer),
    order_detail_keyboard(order_id, open),
  )
  .await?;
  Ok(true)
}

struct CartLine {
  product: Product,
  quantity: i64,
}

/// Resolves cart lines against the live catalogue. Lines whose product
/// has vanished since being added are dropped from the view.
async fn load_cart_lines(ctx: &SharedContext, cart: &Cart) -> Result<Vec<CartLine>, StoreError> {
  let store = ctx.store();
  let fetched = join_all(
    cart
      .lines()
      .map(|(product_id, quantity)| async move { (Product::get_by_id(store, product_id).await, quantity) }),
  )
  .await;

  let mut lines = Vec::new();
  for (result, quantity) in fetched {
    if let Some(product) = result? {
      lines.push(CartLine { product, quantity });
    }
  }
  Ok(lines)
}

fn main_menu_keyboard(admin: bool) -> InlineKeyboardMarkup {
  let mut rows = vec![
    vec![InlineKeyboardButton::callback("🛍️ Browse products", "menu:browse".to_string())],
    vec![InlineKeyboardButton::callback("🛒 My cart", "menu:cart".to_string())],
  ];

  if admin {
    rows.push(vec![InlineKeyboardButton::callback(
      "🛡️ Admin panel",
      "menu:admin".to_string(),
    )]);
  }

  InlineKeyboardMarkup::new(rows)
}

fn main_menu_only_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
    "⬅️ Main menu",
    "menu:root".to_string(),
  )]])
}

fn admin_menu_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![
    vec![
      InlineKeyboardButton::callback("➕ Add product", "admin:add_product".to_string()),
      InlineKeyboardButton::callback("📦 Manage products", "admin:products".to_string()),
    ],
    vec![
      InlineKeyboardButton::callback("📋 Order queue", "admin:queue".to_string()),
      InlineKeyboardButton::callback("📊 Sales stats", "admin:sales".to_string()),
    ],
    vec![InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string())],
  ])
}

fn admin_back_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![
    InlineKeyboardButton::callback("⬅️ Admin panel", "admin:panel".to_string()),
    InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string()),
  ]])
}

fn products_keyboard(products: &[Product]) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = products
    .iter()
    .map(|product| {
      let label = truncate_button_text(&format!("{} — {}", product.name, format_cents(product.price)), 48);
      vec![InlineKeyboardButton::callback(
        label,
        format!("product:{}", product.id.unwrap_or(0)),
      )]
    })
    .collect();

  rows.push(vec![InlineKeyboardButton::callback(
    "⬅️ Main menu",
    "menu:root".to_string(),
  )]);
  InlineKeyboardMarkup::new(rows)
}

fn product_detail_keyboard(product: &Product) -> InlineKeyboardMarkup {
  let mut rows = Vec::new();
  if product.is_available && product.stock > 0 {
    rows.push(vec![InlineKeyboardButton::callback(
      "➕ Add to cart",
      format!("cart:add:{}", product.id.unwrap_or(0)),
    )]);
  }
  rows.push(vec![
    InlineKeyboardButton::callback("⬅️ Products", "menu:browse".to_string()),
    InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string()),
  ]);
  InlineKeyboardMarkup::new(rows)
}

fn cart_keyboard(empty: bool) -> InlineKeyboardMarkup {
  let mut rows = Vec::new();
  if !empty {
    rows.push(vec![
      InlineKeyboardButton::callback("✅ Checkout", "cart:checkout".to_string()),
      InlineKeyboardButton::callback("🗑 Clear cart", "cart:clear".to_string()),
    ]);
  }
  rows.push(vec![
    InlineKeyboardButton::callback("⬅️ Products", "menu:browse".to_string()),
    InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string()),
  ]);
  InlineKeyboardMarkup::new(rows)
}

fn admin_products_keyboard(products: &[Product]) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = products
    .iter()
    .map(|product| {
      let marker = if product.is_available { "✅" } else { "🚫" };
      let label = truncate_button_text(
        &format!("{} {} — {} in stock", marker, product.name, product.stock),
        48,
      );
      vec![InlineKeyboardButton::callback(
        label,
        format!("admin:edit:{}", product.id.unwrap_or(0)),
      )]
    })
    .collect();

  rows.push(vec![InlineKeyboardButton::callback(
    "➕ Add product",
    "admin:add_product".to_string(),
  )]);
  rows.push(vec![
    InlineKeyboardButton::callback("⬅️ Admin panel", "admin:panel".to_string()),
    InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string()),
  ]);
  InlineKeyboardMarkup::new(rows)
}

fn admin_edit_keyboard(product: &Product) -> InlineKeyboardMarkup {
  let toggle_label = if product.is_available {
    "🚫 Hide from customers"
  } else {
    "✅ Make available"
  };
  InlineKeyboardMarkup::new(vec![
    vec![InlineKeyboardButton::callback(
      toggle_label.to_string(),
      format!("admin:toggle:{}", product.id.unwrap_or(0)),
    )],
    vec![
      InlineKeyboardButton::callback("⬅️ Products", "admin:products".to_string()),
      InlineKeyboardButton::callback("⬅️ Admin panel", "admin:panel".to_string()),
    ],
  ])
}

fn queue_keyboard(orders: &[Order]) -> InlineKeyboardMarkup {
  let mut rows: Vec<Vec<InlineKeyboardButton>> = orders
    .iter()
    .map(|order| {
      let order_id = order.id.unwrap_or(0);
      let label = format!("Order #{} — {}", order_id, format_cents(order.total_amount));
      vec![InlineKeyboardButton::callback(label, format!("order:view:{order_id}"))]
    })
    .collect();

  rows.push(vec![
    InlineKeyboardButton::callback("⬅️ Admin panel", "admin:panel".to_string()),
    InlineKeyboardButton::callback("⬅️ Main menu", "menu:root".to_string()),
  ]);
  InlineKeyboardMarkup::new(rows)
}

fn order_detail_keyboard(order_id: i64, open: bool) -> InlineKeyboardMarkup {
  let mut rows = Vec::new();
  if open {
    rows.push(vec![
      InlineKeyboardButton::callback("✅ Complete", format!("order:complete:{order_id}")),
      InlineKeyboardButton::callback("❌ Cancel", format!("order:cancel:{order_id}")),
    ]);
  }
  rows.push(vec![InlineKeyboardButton::callback(
    "⬅️ Order queue",
    "admin:queue".to_string(),
  )]);
  InlineKeyboardMarkup::new(rows)
}

fn truncate_button_text(text: &str, max_chars: usize) -> String {
  if text.chars().count() <= max_chars {
    return text.to_string();
  }

  let guarded = max_chars.saturating_sub(3);
  if guarded == 0 {
    return "...".to_string();
  }

  let truncated: String = text.chars().take(guarded).collect();
  format!("{truncated}...")
}

fn render_product_detail(product: &Product, in_cart: i64) -> String {
  let mut text = format!("🏷️ {}", product.name);
  if !product.description.trim().is_empty() {
    text.push_str(&format!("\n\n{}", product.description));
  }
  text.push_str(&format!("\n\n💰 Price: {}", format_cents(product.price)));
  if product.is_available && product.stock > 0 {
    text.push_str(&format!("\n📦 In stock: {}", product.stock));
  } else {
    text.push_str("\n🚫 Out of stock");
  }
  if in_cart > 0 {
    text.push_str(&format!("\n🛒 In your cart: {}", in_cart));
  }
  text
}

fn render_admin_product_detail(product: &Product) -> String {
  let mut text = format!("🏷️ {}", product.name);
  if !product.description.trim().is_empty() {
    text.push_str(&format!("\n\n{}", product.description));
  }
  text.push_str(&format!(
    "\n\n💰 Price: {}\n📦 Stock: {}\n{}",
    format_cents(product.price),
    product.stock,
    if product.is_available {
      "✅ Visible to customers"
    } else {
      "🚫 Hidden from customers"
    }
  ));
  text
}

fn render_cart(lines: &[CartLine]) -> String {
  if lines.is_empty() {
    return "🛒 Your cart is empty.".to_string();
  }

  let mut text = String::from("🛒 Your cart:\n");
  let mut total = 0i64;
  for line in lines {
    let subtotal = line.product.price * line.quantity;
    total += subtotal;
    text.push_str(&format!(
      "\n{} x {} — {}",
      line.quantity,
      line.product.name,
      format_cents(subtotal)
    ));
  }
  text.push_str(&format!("\n\n💰 Total: {}", format_cents(total)));
  text
}

fn render_receipt(order: &Order) -> String {
  let mut text = format!("🧾 Order #{} placed!\n", order.id.unwrap_or(0));
  for item in &order.items {
    text.push_str(&format!(
      "\n{} x {} — {}",
      item.quantity,
      item.product_name,
      format_cents(item.subtotal)
    ));
  }
  text.push_str(&format!("\n\n💰 Total: {}", format_cents(order.total_amount)));
  text.push_str("\n⏳ We'll let you know when it's ready.");
  text
}

fn render_order_detail(order: &Order, customer: &str) -> String {
  let mut text = format!(
    "📋 Order #{}\n👤 Customer: {}\n🕒 Placed: {}\n📦 Status: {}\n",
    order.id.unwrap_or(0),
    customer,
    order.created_at.format("%Y-%m-%d %H:%M UTC"),
    order.status
  );
  for item in &order.items {
    text.push_str(&format!(
      "\n{} x {} — {}",
      item.quantity,
      item.product_name,
      format_cents(item.subtotal)
    ));
  }
  text.push_str(&format!("\n\n💰 Total: {}", format_cents(order.total_amount)));
  text
}

fn render_sales_summary(completed_count: usize, revenue_cents: i64) -> String {
  let average = if completed_count == 0 {
    0
  } else {
    revenue_cents / completed_count as i64
  };
  format!(
    "📊 Sales stats\n\n✅ Completed orders: {}\n💰 Total revenue: {}\n📈 Average order: {}",
    completed_count,
    format_cents(revenue_cents),
    format_cents(average)
  )
}

fn message_text(msg: &Message) -> Option<&str> {
  msg.text().or_else(|| msg.caption())
}

#[cfg(test)]
mod tests {
  use super::CartLine;
  use super::admin_edit_keyboard;
  use super::admin_products_keyboard;
  use super::cart_keyboard;
  use super::main_menu_keyboard;
  use super::order_detail_keyboard;
  use super::product_detail_keyboard;
  use super::render_admin_product_detail;
  use super::render_cart;
  use super::render_order_detail;
  use super::render_product_detail;
  use super::render_sales_summary;
  use super::truncate_button_text;
  use crate::models::Order;
  use crate::models::Product;

  #[test]
  fn admin_row_only_for_admins() {
    let admin = main_menu_keyboard(true);
    assert_eq!(admin.inline_keyboard.len(), 3);

    let customer = main_menu_keyboard(false);
    assert_eq!(customer.inline_keyboard.len(), 2);
  }

  #[test]
  fn add_to_cart_hidden_when_out_of_stock() {
    let in_stock = Product::new("Latte", "", 1250, 3);
    assert_eq!(product_detail_keyboard(&in_stock).inline_keyboard.len(), 2);

    let sold_out = Product::new("Latte", "", 1250, 0);
    assert_eq!(product_detail_keyboard(&sold_out).inline_keyboard.len(), 1);
  }

  #[test]
  fn admin_list_routes_to_edit_view_with_add_button() {
    let mut product = Product::new("Latte", "", 1250, 3);
    product.id = Some(7);
    let keyboard = admin_products_keyboard(&[product]);
    assert_eq!(keyboard.inline_keyboard.len(), 3);
    assert_eq!(keyboard.inline_keyboard[0][0].text, "✅ Latte — 3 in stock");
    assert!(matches!(
      &keyboard.inline_keyboard[0][0].kind,
      teloxide::types::InlineKeyboardButtonKind::CallbackData(data) if data == "admin:edit:7"
    ));

    let empty = admin_products_keyboard(&[]);
    assert_eq!(empty.inline_keyboard.len(), 2);
    assert_eq!(empty.inline_keyboard[0][0].text, "➕ Add product");
  }

  #[test]
  fn edit_view_holds_the_toggle_button() {
    let mut product = Product::new("Latte", "", 1250, 3);
    product.id = Some(7);
    let keyboard = admin_edit_keyboard(&product);
    assert_eq!(keyboard.inline_keyboard.len(), 2);
    assert_eq!(keyboard.inline_keyboard[0][0].text, "🚫 Hide from customers");

    product.is_available = false;
    let keyboard = admin_edit_keyboard(&product);
    assert_eq!(keyboard.inline_keyboard[0][0].text, "✅ Make available");
  }

  #[test]
  fn renders_admin_product_detail() {
    let product = Product::new("Latte", "With milk", 1250, 3);
    let text = render_admin_product_detail(&product);
    assert!(text.contains("Latte"));
    assert!(text.contains("$12.50"));
    assert!(text.contains("Stock: 3"));
    assert!(text.contains("Visible to customers"));

    let mut hidden = Product::new("Latte", "", 1250, 3);
    hidden.is_available = false;
    assert!(render_admin_product_detail(&hidden).contains("Hidden from customers"));
  }

  #[test]
  fn checkout_row_only_for_filled_carts() {
    assert_eq!(cart_keyboard(false).inline_keyboard.len(), 2);
    assert_eq!(cart_keyboard(true).inline_keyboard.len(), 1);
  }

  #[test]
  fn renders_product_detail() {
    let product = Product::new("Latte", "With milk", 1250, 3);
    let text = render_product_detail(&product, 2);
    assert!(text.contains("Latte"));
    assert!(text.contains("With milk"));
    assert!(text.contains("$12.50"));
    assert!(text.contains("In stock: 3"));
    assert!(text.contains("In your cart: 2"));

    let mut hidden = Product::new("Latte", "", 1250, 3);
    hidden.is_available = false;
    let text = render_product_detail(&hidden, 0);
    assert!(text.contains("Out of stock"));
    assert!(!text.contains("In your cart"));
  }

  #[test]
  fn renders_cart_with_totals() {
    let lines = vec![
      CartLine {
        product: Product::new("Latte", "", 1250, 5),
        quantity: 2,
      },
      CartLine {
        product: Product::new("Muffin", "", 300, 5),
        quantity: 1,
      },
    ];
    let text = render_cart(&lines);
    assert!(text.contains("2 x Latte — $25.00"));
    assert!(text.contains("1 x Muffin — $3.00"));
    assert!(text.contains("Total: $28.00"));

    assert!(render_cart(&[]).contains("empty"));
  }

  #[test]
  fn renders_order_detail_with_actions_when_open() {
    let order = Order::from_record(&crate::store::Record::from([
      ("id".to_string(), "4".to_string()),
      ("user_id".to_string(), "1".to_string()),
      ("total_amount".to_string(), "25.00".to_string()),
      ("status".to_string(), "pending".to_string()),
    ]));
    let text = render_order_detail(&order, "Ada");
    assert!(text.contains("Order #4"));
    assert!(text.contains("Ada"));
    assert!(text.contains("pending"));
    assert!(text.contains("$25.00"));

    assert_eq!(order_detail_keyboard(4, true).inline_keyboard.len(), 2);
    assert_eq!(order_detail_keyboard(4, false).inline_keyboard.len(), 1);
  }

  #[test]
  fn renders_sales_summary() {
    let text = render_sales_summary(3, 4500);
    assert!(text.contains("Completed orders: 3"));
    assert!(text.contains("$45.00"));
    assert!(text.contains("Average order: $15.00"));

    assert!(render_sales_summary(0, 0).contains("Average order: $0.00"));
  }

  #[test]
  fn truncates_long_button_labels() {
    let short = truncate_button_text("Latte", 48);
    assert_eq!(short, "Latte");

    let long = truncate_button_text(&"x".repeat(60), 48);
    assert_eq!(long.chars().count(), 48);
    assert!(long.ends_with("..."));
  }
}
