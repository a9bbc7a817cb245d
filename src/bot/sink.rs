use super::resilient::{send_action_safe, send_message_resilient};
use crate::media::{ChatSink, MediaKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ReplyParameters};

/// [`ChatSink`] replying to one Telegram message
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
    reply_to: MessageId,
}

impl TelegramSink {
    /// Sink answering `msg` in its chat
    #[must_use]
    pub fn replying_to(bot: Bot, msg: &Message) -> Self {
        Self {
            bot,
            chat_id: msg.chat.id,
            reply_to: msg.id,
        }
    }

    fn reply(&self) -> ReplyParameters {
        ReplyParameters::new(self.reply_to).allow_sending_without_reply()
    }
}

#[async_trait]
impl ChatSink for TelegramSink {
    async fn send_text(&self, text: &str) -> Result<()> {
        send_message_resilient(&self.bot, self.chat_id, self.reply_to, text).await?;
        Ok(())
    }

    async fn send_media(&self, kind: MediaKind, path: &Path) -> Result<()> {
        let file = InputFile::file(path.to_path_buf());
        match kind {
            MediaKind::Video => {
                send_action_safe(&self.bot, self.chat_id, ChatAction::UploadVideo).await;
                self.bot
                    .send_video(self.chat_id, file)
                    .supports_streaming(true)
                    .reply_parameters(self.reply())
                    .await?;
            }
            MediaKind::Photo => {
                send_action_safe(&self.bot, self.chat_id, ChatAction::UploadPhoto).await;
                self.bot
                    .send_photo(self.chat_id, file)
                    .reply_parameters(self.reply())
                    .await?;
            }
            MediaKind::Document => {
                send_action_safe(&self.bot, self.chat_id, ChatAction::UploadDocument).await;
                self.bot
                    .send_document(self.chat_id, file)
                    .reply_parameters(self.reply())
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_photo_url(&self, url: &str) -> Result<()> {
        let url = reqwest::Url::parse(url).with_context(|| format!("invalid image URL: {url}"))?;
        self.bot
            .send_photo(self.chat_id, InputFile::url(url))
            .reply_parameters(self.reply())
            .await?;
        Ok(())
    }
}
