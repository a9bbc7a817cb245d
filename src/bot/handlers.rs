use crate::config::{
    Settings, ACCESS_DENIED_MESSAGE, ACCESS_RESTRICTED_MESSAGE, EMPTY_RESULT_MESSAGE,
    MAX_ERROR_DETAIL_CHARS, REJECTION_MESSAGE, SESSION_DELETED_MESSAGE, SESSION_NOT_FOUND_MESSAGE,
    SESSION_SAVED_MESSAGE, SESSION_USAGE_MESSAGE, WELCOME_MESSAGE,
};
use crate::media::{ChatSink, DownloadError, DownloadService};
use crate::session::{DeleteOutcome, SessionStore};
use crate::utils::truncate_str;
use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    utils::command::{BotCommands, ParseError},
};
use tracing::{info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// List commands
    #[command(description = "Show this help.")]
    Help,
    /// Store the Instagram session id
    #[command(
        description = "Save Instagram login: /session YOUR_SESSION_ID",
        parse_with = session_args
    )]
    Session(String),
    /// Remove the stored Instagram session id
    #[command(description = "Delete the saved Instagram login.")]
    Delete,
}

/// `/session` argument: the first token, possibly empty
#[allow(clippy::unnecessary_wraps)]
fn session_args(input: String) -> Result<(String,), ParseError> {
    let token = input.split_whitespace().next().unwrap_or_default();
    Ok((token.to_string(),))
}

/// Everything the handlers need, shared across updates
pub struct BotContext {
    /// Loaded settings
    pub settings: Arc<Settings>,
    /// Instagram session file
    pub sessions: SessionStore,
    /// Download pipeline
    pub service: DownloadService,
}

/// Render a download failure as the chat reply
#[must_use]
pub fn describe_error(error: &DownloadError) -> String {
    match error {
        DownloadError::NoMatch => REJECTION_MESSAGE.to_string(),
        DownloadError::AccessRestricted => ACCESS_RESTRICTED_MESSAGE.to_string(),
        DownloadError::EmptyResult => EMPTY_RESULT_MESSAGE.to_string(),
        DownloadError::Timeout { stage, after } => {
            format!("⏱ Timed out after {}s while {stage}.", after.as_secs())
        }
        DownloadError::RelayFailed(detail) => format!(
            "❌ Failed to send media:\n{}",
            truncate_str(detail, MAX_ERROR_DETAIL_CHARS)
        ),
        DownloadError::ExtractionFailed(detail) => {
            format!("❌ Error:\n{}", truncate_str(detail, MAX_ERROR_DETAIL_CHARS))
        }
        DownloadError::InstagramFailed(detail) => format!(
            "⚠️ Instagram error.\n{}",
            truncate_str(detail, MAX_ERROR_DETAIL_CHARS)
        ),
        DownloadError::Io(e) => format!("❌ Error:\n{e}"),
    }
}

/// Follow-up listing playlist entries that were skipped
#[must_use]
pub fn describe_skipped(skipped: &[String]) -> String {
    let list = truncate_str(skipped.join("\n"), MAX_ERROR_DETAIL_CHARS);
    format!("⚠️ Some entries could not be downloaded:\n{list}")
}

/// Handle a plain text message
///
/// # Errors
///
/// Returns an error if a reply cannot be delivered.
pub async fn handle_message(ctx: &BotContext, text: &str, sink: &dyn ChatSink) -> Result<()> {
    match ctx.service.handle_text(text, sink).await {
        Ok(report) => {
            if !report.skipped.is_empty() {
                sink.send_text(&describe_skipped(&report.skipped)).await?;
            }
        }
        Err(e) => {
            match &e {
                DownloadError::NoMatch => {}
                DownloadError::AccessRestricted | DownloadError::EmptyResult => {
                    info!(error = %e, "Download produced nothing");
                }
                _ => warn!(error = %e, "Download failed"),
            }
            sink.send_text(&describe_error(&e)).await?;
        }
    }
    Ok(())
}

/// Handle a parsed command from `user_id`
///
/// # Errors
///
/// Returns an error if the session file cannot be written or a reply cannot
/// be delivered.
pub async fn handle_command(
    ctx: &BotContext,
    cmd: Command,
    user_id: i64,
    sink: &dyn ChatSink,
) -> Result<()> {
    match cmd {
        Command::Start => sink.send_text(WELCOME_MESSAGE).await,
        Command::Help => sink.send_text(&Command::descriptions().to_string()).await,
        Command::Session(args) => {
            if !ctx.settings.is_admin(user_id) {
                info!(user_id, "Rejected /session from non-admin");
                return sink.send_text(ACCESS_DENIED_MESSAGE).await;
            }
            match args.split_whitespace().next() {
                Some(session_id) => {
                    ctx.sessions.set(session_id).await?;
                    info!(user_id, "Instagram session updated");
                    sink.send_text(SESSION_SAVED_MESSAGE).await
                }
                None => sink.send_text(SESSION_USAGE_MESSAGE).await,
            }
        }
        Command::Delete => {
            if !ctx.settings.is_admin(user_id) {
                info!(user_id, "Rejected /delete from non-admin");
                return sink.send_text(ACCESS_DENIED_MESSAGE).await;
            }
            match ctx.sessions.delete().await? {
                DeleteOutcome::Deleted => sink.send_text(SESSION_DELETED_MESSAGE).await,
                DeleteOutcome::NotFound => sink.send_text(SESSION_NOT_FOUND_MESSAGE).await,
            }
        }
    }
}
