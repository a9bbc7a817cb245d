//! Extraction providers
//!
//! External collaborators that turn a URL into media: the yt-dlp executable
//! for everything generic, and thin HTTP clients for the Instagram and
//! Facebook specific paths. Each sits behind a trait so the dispatcher can be
//! exercised without network access.

/// Facebook post page scraper
pub mod facebook;
/// Instagram post lookup and download
pub mod instagram;
/// yt-dlp subprocess extractor
pub mod ytdlp;

pub use facebook::FacebookWebScraper;
pub use instagram::InstagramWebClient;
pub use ytdlp::YtDlp;

use crate::session::SessionCredential;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by extraction providers
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The extractor executable could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The extractor ran and reported an error
    #[error("{0}")]
    Failed(String),
    /// Transient failure reported by the extractor
    #[error("temporary error: {0}")]
    Transient(String),
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status
    #[error("{context} returned HTTP {status}")]
    Status {
        /// What was being fetched
        context: &'static str,
        /// Response status
        status: reqwest::StatusCode,
    },
    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Parse(String),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether retrying the same call may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Parameters of one generic extraction call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Media URL
    pub url: String,
    /// Directory receiving the files
    pub output_dir: PathBuf,
    /// Netscape cookie file to send along
    pub cookie_file: Option<PathBuf>,
    /// Expand playlists and carousels
    pub expand_playlists: bool,
}

/// Files produced by one extraction call, in production order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractOutput {
    /// Produced files
    pub files: Vec<PathBuf>,
    /// Error lines of entries that failed while others succeeded
    pub failed_entries: Vec<String>,
}

/// General-purpose media extractor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download the media behind `request.url` into `request.output_dir`
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractOutput, ProviderError>;
}

/// One media resource of an Instagram post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstagramMedia {
    /// Direct CDN URL
    pub url: String,
    /// Video or image
    pub is_video: bool,
}

/// Resolved Instagram post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstagramPost {
    /// Post shortcode
    pub shortcode: String,
    /// Media in carousel order
    pub media: Vec<InstagramMedia>,
}

/// Instagram post lookup and download
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstagramClient: Send + Sync {
    /// Resolve a post by shortcode, optionally authenticated
    async fn fetch_post(
        &self,
        shortcode: &str,
        session: Option<SessionCredential>,
    ) -> Result<InstagramPost, ProviderError>;

    /// Download every media file of `post` into `dir`
    async fn download_post(
        &self,
        post: &InstagramPost,
        session: Option<SessionCredential>,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ProviderError>;
}

/// Media references found on a Facebook post
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FacebookPost {
    /// Video reference, if any
    pub video: Option<String>,
    /// Image URL, if any
    pub image: Option<String>,
}

/// Facebook post scraper
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FacebookScraper: Send + Sync {
    /// Scrape a single post URL. `None` means nothing readable was found.
    async fn first_post(&self, url: &str) -> Result<Option<FacebookPost>, ProviderError>;
}
