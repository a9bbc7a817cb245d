use dotenvy::dotenv;
use oxide_media_bot::config::Settings;
use oxide_media_bot::{bot, liveness, logging};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load .env file
    dotenv().ok();

    logging::init(logging::debug_mode_from_env());

    info!("Starting media download bot...");

    let settings = init_settings();

    match settings.health_socket_addr() {
        Ok(addr) => {
            liveness::spawn(addr);
        }
        Err(e) => warn!(
            "Invalid HEALTH_ADDR {:?}, liveness endpoint disabled: {}",
            settings.health_addr, e
        ),
    }

    let context = match bot::init_context(settings) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to initialize bot: {}", e);
            std::process::exit(1);
        }
    };

    bot::run_bot(context).await;
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
