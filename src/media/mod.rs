//! Media download pipeline
//!
//! URL classification, strategy dispatch, relay of produced files back to the
//! chat, and the per-request work area that keeps concurrent requests apart.
//! Nothing in here knows about Telegram; replies go through [`ChatSink`].

/// URL matching and strategy selection
pub mod classifier;
/// Strategy dispatch over the extraction providers
pub mod dispatcher;
/// Upload of produced media through a chat sink
pub mod relay;
/// End-to-end handling of one incoming text
pub mod service;
/// Reply seam between the pipeline and the chat transport
pub mod sink;
/// Per-request temporary directory
pub mod work_area;

pub use classifier::{find_media_url, Strategy};
pub use dispatcher::{DispatchOptions, Dispatcher};
pub use relay::MediaRelay;
pub use service::{DownloadReport, DownloadService};
pub use sink::{ChatSink, MediaKind};
pub use work_area::WorkArea;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a download request did not produce its replies
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The text holds no supported link
    #[error("no supported media link found")]
    NoMatch,
    /// The extractor or a platform scraper failed
    #[error("{0}")]
    ExtractionFailed(String),
    /// Instagram lookup failed with a session stored, or post files could
    /// not be fetched
    #[error("{0}")]
    InstagramFailed(String),
    /// Instagram lookup failed and no session is stored
    #[error("post may be private or restricted")]
    AccessRestricted,
    /// The Facebook scraper found neither video nor image
    #[error("post is private or requires login")]
    EmptyResult,
    /// A bounded stage did not finish in time
    #[error("timed out after {}s while {stage}", .after.as_secs())]
    Timeout {
        /// Stage that was running
        stage: &'static str,
        /// Bound that expired
        after: Duration,
    },
    /// The chat transport rejected an upload
    #[error("{0}")]
    RelayFailed(String),
    /// Work area could not be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single piece of media ready to relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaItem {
    /// File produced in the work area
    File(PathBuf),
    /// Remote image forwarded by URL
    PhotoUrl(String),
}

/// Output of one dispatch, in production order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Media to relay
    pub items: Vec<MediaItem>,
    /// Playlist entries that failed while others succeeded
    pub skipped: Vec<String>,
}

impl Extraction {
    /// Extraction holding only local files
    #[must_use]
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            items: files.into_iter().map(MediaItem::File).collect(),
            skipped: Vec::new(),
        }
    }

    /// Extraction holding a single item
    #[must_use]
    pub fn single(item: MediaItem) -> Self {
        Self {
            items: vec![item],
            skipped: Vec::new(),
        }
    }
}
