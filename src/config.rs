//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the fixed constants used by the download flow.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub bot_token: String,

    /// File holding the raw Instagram session id
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Root under which per-request work areas are created
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Bind address of the liveness endpoint
    #[serde(default = "default_health_addr")]
    pub health_addr: String,

    /// Path or name of the yt-dlp executable
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Netscape cookie file passed to yt-dlp for `YouTube` links, if present
    #[serde(default = "default_youtube_cookies_file")]
    pub youtube_cookies_file: Option<PathBuf>,

    /// JSON cookie map used when scraping Facebook posts, if present
    #[serde(default = "default_facebook_cookies_file")]
    pub facebook_cookies_file: Option<PathBuf>,

    /// Expand playlists and carousels into every entry
    #[serde(default = "default_true")]
    pub expand_playlists: bool,

    /// Upper bound for a single extraction call
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,

    /// Upper bound for a single upload to Telegram
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    /// Comma-separated list of users allowed to manage the session
    #[serde(rename = "admin_users")]
    pub admin_users_str: Option<String>,
}

fn default_session_file() -> PathBuf {
    PathBuf::from("sessionid.txt")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_health_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_youtube_cookies_file() -> Option<PathBuf> {
    Some(PathBuf::from("youtube_cookies.txt"))
}

fn default_facebook_cookies_file() -> Option<PathBuf> {
    Some(PathBuf::from("cookies.json"))
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_extraction_timeout() -> u64 {
    EXTRACTION_TIMEOUT_SECS
}

const fn default_upload_timeout() -> u64 {
    UPLOAD_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            session_file: default_session_file(),
            work_dir: default_work_dir(),
            health_addr: default_health_addr(),
            ytdlp_path: default_ytdlp_path(),
            youtube_cookies_file: default_youtube_cookies_file(),
            facebook_cookies_file: default_facebook_cookies_file(),
            expand_playlists: true,
            extraction_timeout_secs: EXTRACTION_TIMEOUT_SECS,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            admin_users_str: None,
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oxide_media_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the set of Telegram IDs allowed to run `/session` and `/delete`.
    /// An empty set means everyone may.
    #[must_use]
    pub fn admin_users(&self) -> HashSet<i64> {
        self.admin_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may manage the stored session
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        let admins = self.admin_users();
        admins.is_empty() || admins.contains(&user_id)
    }

    /// Parsed liveness bind address
    ///
    /// # Errors
    ///
    /// Returns an error if `health_addr` is not a valid socket address.
    pub fn health_socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.health_addr.parse()
    }

    /// Extraction timeout as a `Duration`
    #[must_use]
    pub const fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Upload timeout as a `Duration`
    #[must_use]
    pub const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__WORK_DIR=/tmp/dl ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables, empty values treated as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Reply sent when a message holds no supported link
pub const REJECTION_MESSAGE: &str = "❌ No supported media link found.";
/// Reply sent before extraction starts
pub const DOWNLOADING_MESSAGE: &str = "⏳ Downloading...";
/// Body returned by the liveness endpoint
pub const ALIVE_MESSAGE: &str = "✅ Bot is alive";
/// Reply to `/start`
pub const WELCOME_MESSAGE: &str = "👋 Send me a YouTube, Instagram, TikTok or Facebook link and I will send the media back.";
/// Guidance when an Instagram lookup fails without a session
pub const ACCESS_RESTRICTED_MESSAGE: &str =
    "⚠️ Post may be private or restricted. Use /session to add login.";
/// Reply when a Facebook post exposes no media
pub const EMPTY_RESULT_MESSAGE: &str = "⚠️ Facebook post is private or requires login.";
/// Reply to `/session` after saving
pub const SESSION_SAVED_MESSAGE: &str = "✅ Instagram session ID saved.";
/// Reply to `/session` without an argument
pub const SESSION_USAGE_MESSAGE: &str = "⚠️ Usage: /session YOUR_SESSION_ID";
/// Reply to `/delete` after removal
pub const SESSION_DELETED_MESSAGE: &str = "❌ Instagram session ID deleted.";
/// Reply to `/delete` when nothing is stored
pub const SESSION_NOT_FOUND_MESSAGE: &str = "No session ID found.";
/// Reply to session commands from users outside `ADMIN_USERS`
pub const ACCESS_DENIED_MESSAGE: &str = "⛔️ Access denied";
/// Longest error detail quoted back to the chat
pub const MAX_ERROR_DETAIL_CHARS: usize = 3000;

/// Default extraction timeout in seconds
pub const EXTRACTION_TIMEOUT_SECS: u64 = 300; // 5 minutes
/// Default upload timeout in seconds
pub const UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Max backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Max attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
