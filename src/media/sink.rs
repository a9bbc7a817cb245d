use async_trait::async_trait;
use std::path::Path;

/// Reply kind used for a produced file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Sent as a playable video
    Video,
    /// Sent as a photo
    Photo,
    /// Sent as a generic document
    Document,
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];
const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

impl MediaKind {
    /// Classify a file by its extension, case-insensitively
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_media_bot::media::MediaKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(MediaKind::from_path(Path::new("clip.MP4")), MediaKind::Video);
    /// assert_eq!(MediaKind::from_path(Path::new("cover.webp")), MediaKind::Photo);
    /// assert_eq!(MediaKind::from_path(Path::new("track.m4a")), MediaKind::Document);
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Photo
        } else {
            Self::Document
        }
    }
}

/// Outgoing side of one conversation.
///
/// Implemented by the Telegram transport; the download pipeline only talks
/// to this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Send a plain text reply
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;
    /// Upload a local file as `kind`
    async fn send_media(&self, kind: MediaKind, path: &Path) -> anyhow::Result<()>;
    /// Send a remote image by URL
    async fn send_photo_url(&self, url: &str) -> anyhow::Result<()>;
}
