/// Command and message handlers
pub mod handlers;
/// Retrying Telegram API helpers
pub mod resilient;
/// Dispatcher tree and startup wiring
pub mod runner;
/// Telegram implementation of the chat sink
pub mod sink;

pub use handlers::{BotContext, Command};
pub use runner::{init_context, run_bot};
pub use sink::TelegramSink;
