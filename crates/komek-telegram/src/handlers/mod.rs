//! Telegram update handlers.
//!
//! Every handler converts domain errors into a user-facing reply at this
//! boundary; nothing propagates past the dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;

use tracing::{error, info};

use komek_core::{domain::ChatId, errors::Error};

use crate::router::AppState;

mod callback;
mod commands;
mod flows;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(message_text) = msg.text() else {
        return Ok(());
    };

    if message_text.starts_with('/') {
        return commands::handle_command(msg, state).await;
    }
    text::handle_text(msg, state).await
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

/// Best-effort plain-text reply; delivery failures are logged, never
/// propagated.
pub(crate) async fn send(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.messenger.send_text(ChatId(chat_id), text).await {
        error!("failed to send reply to {chat_id}: {e}");
    }
}

pub(crate) async fn send_html(state: &AppState, chat_id: i64, html: &str) {
    if let Err(e) = state.messenger.send_html(ChatId(chat_id), html).await {
        error!("failed to send reply to {chat_id}: {e}");
    }
}

/// NotFound/Conflict/Validation are user errors and log at info; the rest
/// are operator problems.
pub(crate) fn log_handler_error(context: &str, err: &Error) {
    if err.is_user_error() {
        info!("{context}: {err}");
    } else {
        error!("{context}: {err}");
    }
}

/// Gate an admin-only entry point. Replies and returns false when the
/// caller is not an admin.
pub(crate) async fn ensure_admin(state: &AppState, chat_id: i64, user_id: i64) -> bool {
    match state.ledger.is_admin(user_id) {
        Ok(true) => true,
        Ok(false) => {
            send(state, chat_id, komek_core::texts::NOT_ALLOWED).await;
            false
        }
        Err(e) => {
            log_handler_error("admin check", &e);
            send(state, chat_id, &komek_core::texts::generic_error(&e)).await;
            false
        }
    }
}
