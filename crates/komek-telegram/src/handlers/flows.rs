//! Shared subscription-flow pieces used by both the text and callback
//! handlers.

use tracing::{error, warn};

use komek_core::{
    domain::{ChatId, Grade},
    messaging::types::{InlineButton, InlineKeyboard},
    texts,
};

use crate::callback_data::CallbackData;
use crate::router::AppState;

use super::{send, send_html};

pub(crate) fn grade_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(
        Grade::ALL
            .iter()
            .map(|g| InlineButton::new(texts::grade_button(g), CallbackData::Grade(*g).encode()))
            .collect(),
    )
}

pub(crate) async fn send_grade_menu(state: &AppState, chat_id: i64) {
    if let Err(e) = state
        .messenger
        .send_keyboard(ChatId(chat_id), texts::GRADE_PROMPT, grade_keyboard())
        .await
    {
        error!("failed to send grade menu to {chat_id}: {e}");
    }
}

pub(crate) async fn offer_subscription(state: &AppState, chat_id: i64) {
    let keyboard = InlineKeyboard::one_per_row(vec![InlineButton::new(
        texts::SUBSCRIBE_BUTTON,
        CallbackData::Subscribe.encode(),
    )]);
    let offer = texts::subscription_offer_html(state.cfg.subscription_price);
    if let Err(e) = state
        .messenger
        .send_keyboard(ChatId(chat_id), &offer, keyboard)
        .await
    {
        error!("failed to send subscription offer to {chat_id}: {e}");
    }
}

pub(crate) async fn offer_extension(state: &AppState, chat_id: i64) {
    let keyboard = InlineKeyboard::one_per_row(vec![InlineButton::new(
        texts::EXTEND_BUTTON,
        CallbackData::Extend.encode(),
    )]);
    let offer = texts::extension_offer_html(state.cfg.subscription_price);
    if let Err(e) = state
        .messenger
        .send_keyboard(ChatId(chat_id), &offer, keyboard)
        .await
    {
        error!("failed to send extension offer to {chat_id}: {e}");
    }
}

/// Broadcast an HTML notice to every admin, continuing past per-recipient
/// failures.
pub(crate) async fn notify_admins(state: &AppState, html: &str) {
    let admin_ids = match state.ledger.admin_ids() {
        Ok(ids) => ids,
        Err(e) => {
            error!("failed to list admins: {e}");
            return;
        }
    };
    for admin_id in admin_ids {
        if let Err(e) = state.messenger.send_html(ChatId(admin_id), html).await {
            warn!("admin notice to {admin_id} failed: {e}");
        }
    }
}

/// A user typed their phone number: show payment instructions and tell
/// the admins who wants to subscribe.
pub(crate) async fn finalize_subscription(state: &AppState, chat_id: i64, phone: &str) {
    let price = state.cfg.subscription_price;
    send_html(
        state,
        chat_id,
        &texts::payment_instructions_html(price, &state.cfg.payment_details),
    )
    .await;
    send(state, chat_id, texts::SUBSCRIPTION_PENDING).await;

    notify_admins(state, &texts::admin_subscription_request_html(chat_id, phone)).await;
}

/// A user picked an extension period: show the total and tell the admins.
pub(crate) async fn finalize_extension(state: &AppState, chat_id: i64, months: u32) {
    let total = state.cfg.subscription_price * months;
    send_html(
        state,
        chat_id,
        &texts::payment_instructions_html(total, &state.cfg.payment_details),
    )
    .await;
    send(state, chat_id, texts::EXTENSION_PENDING).await;

    notify_admins(state, &texts::admin_extension_request_html(chat_id, months)).await;
}
