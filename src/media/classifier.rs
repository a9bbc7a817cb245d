//! URL classification
//!
//! Finds the first supported link in free text and maps it to the strategy
//! that handles its domain. All functions here are pure.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use reqwest::Url;

/// `http(s)://` followed by a non-whitespace run containing an allow-listed host
static RE_MEDIA_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"https?://[^\s]*?(?:instagram\.com|youtube\.com|youtu\.be|tiktok\.com|facebook\.com|fb\.watch)[^\s]*"
);

/// Path segments that precede an Instagram shortcode
const INSTAGRAM_POST_SEGMENTS: &[&str] = &["p", "reel", "reels", "tv"];

/// Path markers of single public Instagram posts that yt-dlp handles without login
const INSTAGRAM_PUBLIC_SHAPES: &[&str] = &["/reel/", "/tv/", "/p/"];

/// Extraction strategy, chosen by domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// General-purpose extractor (yt-dlp)
    Generic,
    /// Instagram post lookup with session-aware fallback
    Instagram,
    /// Facebook post scraper
    Facebook,
}

impl Strategy {
    /// Select the strategy for a classified URL
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        if url.contains("instagram.com") {
            Self::Instagram
        } else if url.contains("facebook.com") || url.contains("fb.watch") {
            Self::Facebook
        } else {
            Self::Generic
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
        }
    }
}

/// Return the first supported media URL in `text`, unchanged.
///
/// # Examples
///
/// ```
/// use oxide_media_bot::media::find_media_url;
/// assert_eq!(
///     find_media_url("check this out https://youtu.be/abc123 nice"),
///     Some("https://youtu.be/abc123")
/// );
/// assert_eq!(find_media_url("no links here"), None);
/// ```
#[must_use]
pub fn find_media_url(text: &str) -> Option<&str> {
    RE_MEDIA_URL.find(text).map(|m| m.as_str())
}

/// Whether the URL points at `YouTube`
#[must_use]
pub fn is_youtube(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Whether the URL points at Instagram
#[must_use]
pub fn is_instagram(url: &str) -> bool {
    url.contains("instagram.com")
}

/// Whether an Instagram URL has the shape of a single public post
#[must_use]
pub fn is_public_instagram_post(url: &str) -> bool {
    INSTAGRAM_PUBLIC_SHAPES.iter().any(|shape| url.contains(shape))
}

/// Extract the post shortcode from an Instagram URL.
///
/// Takes the segment after `/p/`, `/reel/`, `/reels/` or `/tv/`, otherwise
/// the last non-empty path segment. Query and fragment are ignored.
#[must_use]
pub fn instagram_shortcode(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    let candidate = segments
        .iter()
        .position(|segment| INSTAGRAM_POST_SEGMENTS.contains(segment))
        .and_then(|idx| segments.get(idx + 1))
        .or_else(|| segments.last())?;

    let valid = candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (*candidate).to_string())
}
