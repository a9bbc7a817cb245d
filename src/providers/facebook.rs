//! Facebook post scraper
//!
//! Fetches the post page once and reads the Open Graph media tags. A video
//! tag is only used as a signal: the video itself is left to the generic
//! extractor. An image tag is forwarded as-is.

use super::{FacebookPost, FacebookScraper, ProviderError};
use async_trait::async_trait;
use lazy_regex::lazy_regex;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// `<meta property="og:..." content="...">`, either attribute order
static OG_META_RE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r#"<meta\s+(?:property="(og:[a-z:_]+)"\s+content="([^"]*)"|content="([^"]*)"\s+property="(og:[a-z:_]+)")"#
);

/// Browser cookie export entry
#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
}

/// Cookie file formats accepted: a flat name/value map or a browser export list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CookieFile {
    Map(BTreeMap<String, String>),
    List(Vec<ExportedCookie>),
}

impl CookieFile {
    fn into_header(self) -> String {
        let pairs: Vec<String> = match self {
            Self::Map(map) => map.into_iter().map(|(k, v)| format!("{k}={v}")).collect(),
            Self::List(list) => list
                .into_iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect(),
        };
        pairs.join("; ")
    }
}

/// Load a JSON cookie file into a `Cookie` header value
///
/// # Errors
///
/// Returns `ProviderError::Io` if the file cannot be read, or
/// `ProviderError::Parse` if it is not a supported cookie format.
pub fn load_cookie_header(path: &Path) -> Result<String, ProviderError> {
    let raw = std::fs::read_to_string(path)?;
    let cookies: CookieFile = serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Parse(format!("cookie file {}: {e}", path.display())))?;
    Ok(cookies.into_header())
}

/// Extract the media references of a post page
#[must_use]
pub fn parse_post_page(html: &str) -> Option<FacebookPost> {
    let mut post = FacebookPost::default();
    for caps in OG_META_RE.captures_iter(html) {
        let (property, content) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
            (Some(p), Some(c), _, _) | (_, _, Some(c), Some(p)) => (p.as_str(), c.as_str()),
            _ => continue,
        };
        if content.is_empty() {
            continue;
        }
        let content = html_escape::decode_html_entities(content).into_owned();
        match property {
            "og:video" | "og:video:url" | "og:video:secure_url" if post.video.is_none() => {
                post.video = Some(content);
            }
            "og:image" | "og:image:url" | "og:image:secure_url" if post.image.is_none() => {
                post.image = Some(content);
            }
            _ => {}
        }
    }

    if post.video.is_none() && post.image.is_none() {
        None
    } else {
        Some(post)
    }
}

/// [`FacebookScraper`] reading post pages over HTTP
#[derive(Debug, Clone)]
pub struct FacebookWebScraper {
    http: HttpClient,
    cookie_header: Option<String>,
}

impl FacebookWebScraper {
    /// Create a scraper, sending cookies from `cookie_file` when it exists
    ///
    /// An unreadable cookie file is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Http` if the HTTP client cannot be built.
    pub fn new(cookie_file: Option<&Path>) -> Result<Self, ProviderError> {
        let cookie_header = cookie_file
            .filter(|path| path.exists())
            .and_then(|path| match load_cookie_header(path) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring Facebook cookie file");
                    None
                }
            });

        let http = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            cookie_header,
        })
    }
}

#[async_trait]
impl FacebookScraper for FacebookWebScraper {
    async fn first_post(&self, url: &str) -> Result<Option<FacebookPost>, ProviderError> {
        let mut request = self.http.get(url).header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        if let Some(ref cookies) = self.cookie_header {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                context: "Facebook post page",
                status,
            });
        }

        let html = response.text().await?;
        let post = parse_post_page(&html);
        debug!(
            url,
            has_video = post.as_ref().is_some_and(|p| p.video.is_some()),
            has_image = post.as_ref().is_some_and(|p| p.image.is_some()),
            "Facebook post scraped"
        );
        Ok(post)
    }
}
