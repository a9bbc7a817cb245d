//! Telegram bot that downloads media from social links and sends it back.
#![warn(missing_docs)]

/// Telegram transport
pub mod bot;
/// Configuration and settings management
pub mod config;
/// Liveness HTTP endpoint
pub mod liveness;
/// Tracing setup with credential masking
pub mod logging;
/// Link classification, extraction dispatch and relay
pub mod media;
/// yt-dlp, Instagram and Facebook providers
pub mod providers;
/// Instagram session storage
pub mod session;
/// Shared helpers
pub mod utils;
