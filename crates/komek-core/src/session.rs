//! Per-chat conversation state.
//!
//! The subscription flow waits for the user to type a phone number after
//! pressing the subscribe button. That pending intent is keyed by chat so
//! concurrent conversations cannot leak into each other.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::domain::ChatId;

#[derive(Default)]
pub struct SessionStore {
    awaiting_phone: Mutex<HashSet<i64>>,
}

impl SessionStore {
    pub async fn expect_phone(&self, chat_id: ChatId) {
        self.awaiting_phone.lock().await.insert(chat_id.0);
    }

    pub async fn is_awaiting_phone(&self, chat_id: ChatId) -> bool {
        self.awaiting_phone.lock().await.contains(&chat_id.0)
    }

    /// Clears the pending intent; returns whether one was set.
    pub async fn consume_phone_request(&self, chat_id: ChatId) -> bool {
        self.awaiting_phone.lock().await.remove(&chat_id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_intent_is_per_chat() {
        let sessions = SessionStore::default();
        sessions.expect_phone(ChatId(1)).await;

        assert!(sessions.is_awaiting_phone(ChatId(1)).await);
        assert!(!sessions.is_awaiting_phone(ChatId(2)).await);

        assert!(sessions.consume_phone_request(ChatId(1)).await);
        assert!(!sessions.consume_phone_request(ChatId(1)).await);
    }
}
