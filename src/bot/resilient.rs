//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Text replies are idempotent enough to resend after a transient network
//! failure, so they go through [`crate::utils::retry_telegram_operation`].
//! Uploads are not retried here: a timed-out upload may still land.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, Message, MessageId, ReplyParameters};
use tracing::debug;

/// Send a text reply with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    reply_to: MessageId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .reply_parameters(ReplyParameters::new(reply_to).allow_sending_without_reply())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Show a chat action, ignoring failures.
pub async fn send_action_safe(bot: &Bot, chat_id: ChatId, action: ChatAction) {
    if let Err(e) = bot.send_chat_action(chat_id, action).await {
        debug!("Failed to send chat action: {e}");
    }
}
