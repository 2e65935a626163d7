use std::sync::Arc;

use rand::seq::SliceRandom;
use teloxide::prelude::*;

use komek_core::{domain::ChatId, texts};

use crate::router::AppState;

use super::{flows, send};

pub(crate) async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(raw) = msg.text() else {
        return Ok(());
    };

    let chat_id = msg.chat.id.0;
    let text = raw.trim();
    let lower = text.to_lowercase();

    // Pending subscription intent: the next message should be a phone
    // number.
    if state.sessions.is_awaiting_phone(ChatId(chat_id)).await {
        if looks_like_phone(text) {
            state.sessions.consume_phone_request(ChatId(chat_id)).await;
            flows::finalize_subscription(&state, chat_id, text).await;
        } else {
            send(&state, chat_id, texts::BAD_PHONE).await;
        }
        return Ok(());
    }

    if lower == "подписка" {
        flows::offer_subscription(&state, chat_id).await;
        return Ok(());
    }
    if lower == "продлить подписку" {
        flows::offer_extension(&state, chat_id).await;
        return Ok(());
    }

    if lower.contains("почему") {
        send(&state, chat_id, "Потому").await;
        return Ok(());
    }
    if lower.contains("тупой") {
        send(&state, chat_id, "Я умный").await;
        return Ok(());
    }

    if texts::GREETING_TRIGGERS.iter().any(|w| lower.contains(w)) {
        let username = display_name(user);
        send(&state, chat_id, &texts::greeting(&username)).await;
        flows::send_grade_menu(&state, chat_id).await;
        return Ok(());
    }

    let reply = texts::UNKNOWN_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(texts::UNKNOWN_REPLIES[0]);
    send(&state, chat_id, reply).await;

    Ok(())
}

fn looks_like_phone(text: &str) -> bool {
    text.starts_with('+')
        || text
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
}

pub(crate) fn display_name(user: &teloxide::types::User) -> String {
    if !user.first_name.is_empty() {
        return user.first_name.clone();
    }
    user.username.clone().unwrap_or_else(|| "друг".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_detection() {
        assert!(looks_like_phone("+77011234567"));
        assert!(looks_like_phone("87011234567"));
        assert!(!looks_like_phone("не номер"));
        assert!(!looks_like_phone(""));
    }
}
