use super::handlers::{self, get_user_id_safe, BotContext, Command};
use super::sink::TelegramSink;
use crate::config::Settings;
use crate::media::{DispatchOptions, Dispatcher as MediaDispatcher, DownloadService, MediaRelay};
use crate::providers::{FacebookWebScraper, InstagramWebClient, YtDlp};
use crate::session::SessionStore;
use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info, info_span, Instrument};

/// Wire the providers and the download pipeline from `settings`.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built.
pub fn init_context(settings: Arc<Settings>) -> Result<BotContext> {
    let sessions = SessionStore::new(settings.session_file.clone());

    let extractor = Arc::new(YtDlp::new(settings.ytdlp_path.clone()));
    let instagram = Arc::new(InstagramWebClient::new()?);
    let facebook = Arc::new(FacebookWebScraper::new(
        settings.facebook_cookies_file.as_deref(),
    )?);
    info!(ytdlp = %settings.ytdlp_path, "Extraction providers initialized.");

    let dispatcher = MediaDispatcher::new(
        extractor,
        instagram,
        facebook,
        sessions.clone(),
        DispatchOptions {
            expand_playlists: settings.expand_playlists,
            youtube_cookies_file: settings.youtube_cookies_file.clone(),
        },
    );
    let service = DownloadService::new(
        dispatcher,
        MediaRelay::new(settings.upload_timeout()),
        settings.work_dir.clone(),
        settings.extraction_timeout(),
    );

    Ok(BotContext {
        settings,
        sessions,
        service,
    })
}

/// Run the Telegram long-polling loop until Ctrl-C.
pub async fn run_bot(context: Arc<BotContext>) {
    let bot = Bot::new(context.settings.bot_token.clone());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![context])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            // Plain text only; unknown commands are ignored
            dptree::filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                .endpoint(handle_text),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let sink = TelegramSink::replying_to(bot, &msg);
    let span = info_span!("command", chat_id = msg.chat.id.0, user_id);

    if let Err(e) = handlers::handle_command(&context, cmd, user_id, &sink)
        .instrument(span)
        .await
    {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    context: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let sink = TelegramSink::replying_to(bot, &msg);
    let span = info_span!("message", chat_id = msg.chat.id.0);

    if let Err(e) = Box::pin(handlers::handle_message(&context, text.trim(), &sink))
        .instrument(span)
        .await
    {
        error!("Text handler error: {}", e);
    }
    respond(())
}
