//! Instagram web client
//!
//! Resolves a post through the web media-info endpoint and streams its media
//! files to disk. The session id, when present, is sent as the `sessionid`
//! cookie; nothing else about the account is known or needed.

use super::{InstagramClient, InstagramMedia, InstagramPost, ProviderError};
use crate::session::SessionCredential;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
const WEB_APP_ID: &str = "936619743392459";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Alphabet of Instagram shortcodes, in digit order
const SHORTCODE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
/// Only the leading characters encode the media id
const SHORTCODE_ID_LEN: usize = 11;

/// Decode a post shortcode into its numeric media id
#[must_use]
pub fn shortcode_to_media_id(shortcode: &str) -> Option<u128> {
    if shortcode.is_empty() {
        return None;
    }
    shortcode
        .bytes()
        .take(SHORTCODE_ID_LEN)
        .try_fold(0u128, |id, byte| {
            let digit = SHORTCODE_ALPHABET.iter().position(|&c| c == byte)?;
            id.checked_mul(64)?.checked_add(digit as u128)
        })
}

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    #[serde(default)]
    items: Vec<MediaInfoItem>,
}

#[derive(Debug, Deserialize)]
struct MediaInfoItem {
    #[serde(default)]
    carousel_media: Vec<MediaInfoItem>,
    #[serde(default)]
    video_versions: Vec<MediaVersion>,
    image_versions2: Option<ImageVersions>,
}

#[derive(Debug, Deserialize)]
struct ImageVersions {
    #[serde(default)]
    candidates: Vec<MediaVersion>,
}

#[derive(Debug, Deserialize)]
struct MediaVersion {
    url: String,
}

impl MediaInfoItem {
    /// Best rendition of a single (non-carousel) item
    fn best_media(&self) -> Option<InstagramMedia> {
        if let Some(video) = self.video_versions.first() {
            return Some(InstagramMedia {
                url: video.url.clone(),
                is_video: true,
            });
        }
        self.image_versions2
            .as_ref()
            .and_then(|images| images.candidates.first())
            .map(|image| InstagramMedia {
                url: image.url.clone(),
                is_video: false,
            })
    }

    fn into_media(self) -> Vec<InstagramMedia> {
        if self.carousel_media.is_empty() {
            self.best_media().into_iter().collect()
        } else {
            self.carousel_media
                .iter()
                .filter_map(Self::best_media)
                .collect()
        }
    }
}

/// [`InstagramClient`] over the Instagram web API
#[derive(Debug, Clone)]
pub struct InstagramWebClient {
    http: HttpClient,
    base_url: String,
}

impl InstagramWebClient {
    /// Create a client against the public Instagram host
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Http` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another host serving the same API
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Http` if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn with_session(
        request: reqwest::RequestBuilder,
        session: Option<&SessionCredential>,
    ) -> reqwest::RequestBuilder {
        match session {
            Some(session) => request.header(COOKIE, session.cookie_header()),
            None => request,
        }
    }

    async fn download_one(
        &self,
        media: &InstagramMedia,
        session: Option<&SessionCredential>,
        path: &Path,
    ) -> Result<(), ProviderError> {
        let response = Self::with_session(self.http.get(&media.url), session)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                context: "Instagram media download",
                status,
            });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// File name of the `index`-th media of a post with `total` media
fn media_file_name(shortcode: &str, index: usize, total: usize, is_video: bool) -> String {
    let ext = if is_video { "mp4" } else { "jpg" };
    if total == 1 {
        format!("{shortcode}.{ext}")
    } else {
        format!("{shortcode}_{}.{ext}", index + 1)
    }
}

#[async_trait]
impl InstagramClient for InstagramWebClient {
    async fn fetch_post(
        &self,
        shortcode: &str,
        session: Option<SessionCredential>,
    ) -> Result<InstagramPost, ProviderError> {
        let media_id = shortcode_to_media_id(shortcode)
            .ok_or_else(|| ProviderError::Parse(format!("invalid shortcode: {shortcode}")))?;
        let url = format!("{}/api/v1/media/{media_id}/info/", self.base_url);
        debug!(shortcode, authenticated = session.is_some(), "Fetching Instagram post");

        let response = Self::with_session(self.http.get(&url), session.as_ref())
            .header("X-IG-App-ID", WEB_APP_ID)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                context: "Instagram media info",
                status,
            });
        }

        let body: MediaInfoResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("media info has no items".to_string()))?;
        let media = item.into_media();
        if media.is_empty() {
            return Err(ProviderError::Parse("post has no downloadable media".to_string()));
        }

        Ok(InstagramPost {
            shortcode: shortcode.to_string(),
            media,
        })
    }

    async fn download_post(
        &self,
        post: &InstagramPost,
        session: Option<SessionCredential>,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ProviderError> {
        let total = post.media.len();
        let mut files = Vec::with_capacity(total);
        for (index, media) in post.media.iter().enumerate() {
            let path = dir.join(media_file_name(&post.shortcode, index, total, media.is_video));
            self.download_one(media, session.as_ref(), &path).await?;
            files.push(path);
        }
        info!(shortcode = %post.shortcode, files = files.len(), "Instagram post downloaded");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path as UrlPath;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_shortcode_to_media_id() {
        assert_eq!(shortcode_to_media_id("A"), Some(0));
        assert_eq!(shortcode_to_media_id("B_"), Some(127));
        assert_eq!(shortcode_to_media_id("BAAAAAAAAAA"), Some(1 << 60));
        // Characters past the id part are ignored
        assert_eq!(
            shortcode_to_media_id("BAAAAAAAAAAzzzzzzzz"),
            shortcode_to_media_id("BAAAAAAAAAA")
        );
        assert_eq!(shortcode_to_media_id(""), None);
        assert_eq!(shortcode_to_media_id("ab.c"), None);
    }

    #[test]
    fn test_carousel_order_and_best_rendition() {
        let item: MediaInfoItem = serde_json::from_value(json!({
            "carousel_media": [
                {"image_versions2": {"candidates": [{"url": "https://cdn/1.jpg"}, {"url": "https://cdn/1-small.jpg"}]}},
                {"video_versions": [{"url": "https://cdn/2.mp4"}],
                 "image_versions2": {"candidates": [{"url": "https://cdn/2-cover.jpg"}]}},
            ]
        }))
        .expect("deserialize");

        let media = item.into_media();
        assert_eq!(
            media,
            vec![
                InstagramMedia { url: "https://cdn/1.jpg".into(), is_video: false },
                InstagramMedia { url: "https://cdn/2.mp4".into(), is_video: true },
            ]
        );
    }

    #[test]
    fn test_media_file_names() {
        assert_eq!(media_file_name("Cx1", 0, 1, true), "Cx1.mp4");
        assert_eq!(media_file_name("Cx1", 1, 3, false), "Cx1_2.jpg");
    }

    async fn spawn_fake_instagram() -> String {
        async fn info(UrlPath(id): UrlPath<String>, headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
            let authed = headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == "sessionid=abc%3D1");
            if id != "127" || !authed {
                return (StatusCode::FORBIDDEN, Json(json!({"status": "fail"})));
            }
            (
                StatusCode::OK,
                Json(json!({"items": [{
                    "carousel_media": [
                        {"image_versions2": {"candidates": [{"url": "/cdn/one"}]}},
                        {"video_versions": [{"url": "/cdn/two"}]}
                    ]
                }]})),
            )
        }

        let app = Router::new()
            .route("/api/v1/media/{id}/info/", get(info))
            .route("/cdn/one", get(|| async { "first" }))
            .route("/cdn/two", get(|| async { "second" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_and_download_with_session() {
        let base = spawn_fake_instagram().await;
        let client = InstagramWebClient::with_base_url(&base).expect("client");
        let session = SessionCredential::new("abc%3D1");

        let mut post = client
            .fetch_post("B_", Some(session.clone()))
            .await
            .expect("fetch");
        assert_eq!(post.media.len(), 2);
        assert!(post.media[1].is_video);

        // Point the CDN paths at the fake host
        for media in &mut post.media {
            media.url = format!("{base}{}", media.url);
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let files = client
            .download_post(&post, Some(session), dir.path())
            .await
            .expect("download");
        assert_eq!(files, vec![dir.path().join("B__1.jpg"), dir.path().join("B__2.mp4")]);
        assert_eq!(std::fs::read_to_string(&files[0]).expect("read"), "first");
        assert_eq!(std::fs::read_to_string(&files[1]).expect("read"), "second");
    }

    #[tokio::test]
    async fn test_fetch_without_session_is_rejected() {
        let base = spawn_fake_instagram().await;
        let client = InstagramWebClient::with_base_url(base).expect("client");

        let err = client.fetch_post("B_", None).await.expect_err("must fail");
        assert!(matches!(
            err,
            ProviderError::Status { status, .. } if status == reqwest::StatusCode::FORBIDDEN
        ));
    }
}
