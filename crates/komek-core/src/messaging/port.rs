use async_trait::async_trait;

use crate::{domain::ChatId, messaging::types::InlineKeyboard, Result};

/// Outbound messaging port.
///
/// Telegram is the first implementation; the sweeper and the report
/// exporter talk to users through this trait so the core stays
/// framework-agnostic (and testable with a recording fake).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Telegram HTML parse mode (`<b>`, `<i>`, `<a href>`, `<code>`).
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        data: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
