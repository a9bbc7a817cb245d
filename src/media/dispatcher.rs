use super::classifier::{instagram_shortcode, is_public_instagram_post, is_youtube};
use super::{DownloadError, Extraction, MediaItem, Strategy};
use crate::providers::{ExtractRequest, FacebookScraper, InstagramClient, MediaExtractor};
use crate::session::{SessionCredential, SessionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Knobs of the generic strategy
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Expand playlists and carousels
    pub expand_playlists: bool,
    /// Cookie file passed to the extractor for `YouTube` URLs, when it exists
    pub youtube_cookies_file: Option<PathBuf>,
}

/// Runs exactly one extraction strategy per URL.
pub struct Dispatcher {
    extractor: Arc<dyn MediaExtractor>,
    instagram: Arc<dyn InstagramClient>,
    facebook: Arc<dyn FacebookScraper>,
    sessions: SessionStore,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Create a dispatcher over the given providers
    #[must_use]
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        instagram: Arc<dyn InstagramClient>,
        facebook: Arc<dyn FacebookScraper>,
        sessions: SessionStore,
        options: DispatchOptions,
    ) -> Self {
        Self {
            extractor,
            instagram,
            facebook,
            sessions,
            options,
        }
    }

    /// Extract the media behind `url` into `work`.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionFailed`, `InstagramFailed`, `AccessRestricted` or
    /// `EmptyResult` depending on the strategy.
    pub async fn dispatch(&self, url: &str, work: &Path) -> Result<Extraction, DownloadError> {
        match Strategy::for_url(url) {
            Strategy::Generic => self.generic(url, work).await,
            Strategy::Instagram => {
                let session = self.load_session().await;
                self.instagram(url, work, session).await
            }
            Strategy::Facebook => self.facebook(url, work).await,
        }
    }

    async fn load_session(&self) -> Option<SessionCredential> {
        match self.sessions.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to read session file, continuing without session");
                None
            }
        }
    }

    async fn generic(&self, url: &str, work: &Path) -> Result<Extraction, DownloadError> {
        let cookie_file = if is_youtube(url) {
            self.youtube_cookies().await
        } else {
            None
        };

        let request = ExtractRequest {
            url: url.to_string(),
            output_dir: work.to_path_buf(),
            cookie_file,
            expand_playlists: self.options.expand_playlists,
        };
        let output = self
            .extractor
            .extract(&request)
            .await
            .map_err(|e| DownloadError::ExtractionFailed(e.to_string()))?;

        Ok(Extraction {
            items: output.files.into_iter().map(MediaItem::File).collect(),
            skipped: output.failed_entries,
        })
    }

    async fn youtube_cookies(&self) -> Option<PathBuf> {
        let path = self.options.youtube_cookies_file.as_ref()?;
        match tokio::fs::try_exists(path).await {
            Ok(true) => Some(path.clone()),
            _ => {
                debug!(path = %path.display(), "YouTube cookie file not found");
                None
            }
        }
    }

    async fn instagram(
        &self,
        url: &str,
        work: &Path,
        session: Option<SessionCredential>,
    ) -> Result<Extraction, DownloadError> {
        if session.is_none() && is_public_instagram_post(url) {
            debug!(url, "No session stored, using generic extractor");
            return self.generic(url, work).await;
        }

        let Some(shortcode) = instagram_shortcode(url) else {
            return Err(match session {
                None => DownloadError::AccessRestricted,
                Some(_) => DownloadError::InstagramFailed(format!("no post id in {url}")),
            });
        };

        let post = match self.instagram.fetch_post(&shortcode, session.clone()).await {
            Ok(post) => post,
            Err(e) if session.is_none() => {
                info!(shortcode, error = %e, "Instagram lookup failed without session");
                return Err(DownloadError::AccessRestricted);
            }
            Err(e) => return Err(DownloadError::InstagramFailed(e.to_string())),
        };

        let files = self
            .instagram
            .download_post(&post, session, work)
            .await
            .map_err(|e| DownloadError::InstagramFailed(e.to_string()))?;
        Ok(Extraction::from_files(files))
    }

    async fn facebook(&self, url: &str, work: &Path) -> Result<Extraction, DownloadError> {
        let post = self
            .facebook
            .first_post(url)
            .await
            .map_err(|e| DownloadError::ExtractionFailed(e.to_string()))?;

        match post {
            Some(post) if post.video.is_some() => {
                debug!(url, "Facebook post has video, using generic extractor");
                self.generic(url, work).await
            }
            Some(post) => match post.image {
                Some(image) => Ok(Extraction::single(MediaItem::PhotoUrl(image))),
                None => Err(DownloadError::EmptyResult),
            },
            None => Err(DownloadError::EmptyResult),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        ExtractOutput, FacebookPost, InstagramMedia, InstagramPost, MockFacebookScraper,
        MockInstagramClient, MockMediaExtractor, ProviderError,
    };
    use mockall::predicate::{always, eq};

    struct Fixture {
        extractor: MockMediaExtractor,
        instagram: MockInstagramClient,
        facebook: MockFacebookScraper,
        root: tempfile::TempDir,
        options: DispatchOptions,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                extractor: MockMediaExtractor::new(),
                instagram: MockInstagramClient::new(),
                facebook: MockFacebookScraper::new(),
                root: tempfile::tempdir().expect("tempdir"),
                options: DispatchOptions {
                    expand_playlists: true,
                    youtube_cookies_file: None,
                },
            }
        }

        fn session_store(&self) -> SessionStore {
            SessionStore::new(self.root.path().join("sessionid.txt"))
        }

        fn work(&self) -> PathBuf {
            let work = self.root.path().join("work");
            std::fs::create_dir_all(&work).expect("mkdir");
            work
        }

        fn build(self) -> (Dispatcher, tempfile::TempDir) {
            let sessions = SessionStore::new(self.root.path().join("sessionid.txt"));
            let dispatcher = Dispatcher::new(
                Arc::new(self.extractor),
                Arc::new(self.instagram),
                Arc::new(self.facebook),
                sessions,
                self.options,
            );
            (dispatcher, self.root)
        }
    }

    fn files_of(extraction: &Extraction) -> Vec<PathBuf> {
        extraction
            .items
            .iter()
            .filter_map(|item| match item {
                MediaItem::File(path) => Some(path.clone()),
                MediaItem::PhotoUrl(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_instagram_reel_without_session_skips_instagram_client() {
        let mut fx = Fixture::new();
        let work = fx.work();
        let produced = work.join("reel.mp4");

        let expected_out = produced.clone();
        fx.extractor
            .expect_extract()
            .withf(|req| req.url == "https://www.instagram.com/reel/Cx1abc/" && req.cookie_file.is_none())
            .times(1)
            .returning(move |_| {
                Ok(ExtractOutput {
                    files: vec![expected_out.clone()],
                    failed_entries: vec![],
                })
            });
        fx.instagram.expect_fetch_post().never();
        fx.instagram.expect_download_post().never();

        let (dispatcher, _root) = fx.build();
        let extraction = dispatcher
            .dispatch("https://www.instagram.com/reel/Cx1abc/", &work)
            .await
            .expect("dispatch");
        assert_eq!(files_of(&extraction), vec![produced]);
    }

    #[tokio::test]
    async fn test_instagram_lookup_failure_without_session_is_access_restricted() {
        let mut fx = Fixture::new();
        let work = fx.work();

        fx.instagram
            .expect_fetch_post()
            .with(eq("Cx9private"), eq(None::<SessionCredential>))
            .times(1)
            .returning(|_, _| {
                Err(ProviderError::Status {
                    context: "Instagram media info",
                    status: reqwest::StatusCode::UNAUTHORIZED,
                })
            });
        fx.extractor.expect_extract().never();

        let (dispatcher, _root) = fx.build();
        let err = dispatcher
            .dispatch("https://www.instagram.com/reels/Cx9private/", &work)
            .await
            .expect_err("should be restricted");
        assert!(matches!(err, DownloadError::AccessRestricted));
    }

    #[tokio::test]
    async fn test_instagram_lookup_failure_with_session_is_instagram_error() {
        let mut fx = Fixture::new();
        fx.session_store().set("abc123").await.expect("set");
        let work = fx.work();

        fx.instagram
            .expect_fetch_post()
            .with(eq("Cx1abc"), eq(Some(SessionCredential::new("abc123"))))
            .times(1)
            .returning(|_, _| Err(ProviderError::Parse("media info has no items".to_string())));

        let (dispatcher, _root) = fx.build();
        let err = dispatcher
            .dispatch("https://www.instagram.com/p/Cx1abc/", &work)
            .await
            .expect_err("should fail");
        assert!(
            matches!(err, DownloadError::InstagramFailed(ref m) if m.contains("media info has no items"))
        );
    }

    #[tokio::test]
    async fn test_instagram_reel_with_session_never_reaches_extractor() {
        let mut fx = Fixture::new();
        fx.session_store().set("abc123").await.expect("set");
        let work = fx.work();

        let post = InstagramPost {
            shortcode: "Cx1abc".to_string(),
            media: vec![InstagramMedia {
                url: "https://cdn.example/1.mp4".to_string(),
                is_video: true,
            }],
        };
        fx.instagram
            .expect_fetch_post()
            .with(eq("Cx1abc"), eq(Some(SessionCredential::new("abc123"))))
            .times(1)
            .returning(move |_, _| Ok(post.clone()));
        fx.instagram
            .expect_download_post()
            .times(1)
            .returning(|_, _, _| Err(ProviderError::Parse("cdn refused".to_string())));
        fx.extractor.expect_extract().never();

        let (dispatcher, _root) = fx.build();
        let err = dispatcher
            .dispatch("https://www.instagram.com/reel/Cx1abc/", &work)
            .await
            .expect_err("should fail");
        assert!(matches!(err, DownloadError::InstagramFailed(ref m) if m.contains("cdn refused")));
        let leftovers = std::fs::read_dir(&work).expect("read work").count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_instagram_url_without_post_id() {
        let mut fx = Fixture::new();
        let work = fx.work();
        fx.instagram.expect_fetch_post().never();
        fx.extractor.expect_extract().never();

        let (dispatcher, root) = fx.build();
        let err = dispatcher
            .dispatch("https://www.instagram.com/", &work)
            .await
            .expect_err("no session");
        assert!(matches!(err, DownloadError::AccessRestricted));

        SessionStore::new(root.path().join("sessionid.txt"))
            .set("abc123")
            .await
            .expect("set");
        let err = dispatcher
            .dispatch("https://www.instagram.com/", &work)
            .await
            .expect_err("with session");
        assert!(matches!(err, DownloadError::InstagramFailed(_)));
    }

    #[tokio::test]
    async fn test_instagram_with_session_downloads_post() {
        let mut fx = Fixture::new();
        fx.session_store().set("abc123").await.expect("set");
        let work = fx.work();

        let post = InstagramPost {
            shortcode: "Cx1abc".to_string(),
            media: vec![InstagramMedia {
                url: "https://cdn.example/1.jpg".to_string(),
                is_video: false,
            }],
        };
        let fetched = post.clone();
        fx.instagram
            .expect_fetch_post()
            .times(1)
            .returning(move |_, _| Ok(fetched.clone()));
        let expected_file = work.join("Cx1abc.jpg");
        let returned_file = expected_file.clone();
        fx.instagram
            .expect_download_post()
            .with(eq(post), eq(Some(SessionCredential::new("abc123"))), eq(work.clone()))
            .times(1)
            .returning(move |_, _, _| Ok(vec![returned_file.clone()]));

        let (dispatcher, _root) = fx.build();
        let extraction = dispatcher
            .dispatch("https://www.instagram.com/p/Cx1abc/?img_index=1", &work)
            .await
            .expect("dispatch");
        assert_eq!(files_of(&extraction), vec![expected_file]);
    }

    #[tokio::test]
    async fn test_youtube_cookies_only_when_file_exists() {
        let mut fx = Fixture::new();
        let work = fx.work();
        let cookies = fx.root.path().join("youtube_cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").expect("write");
        fx.options.youtube_cookies_file = Some(cookies.clone());

        fx.extractor
            .expect_extract()
            .withf(move |req| req.cookie_file.as_deref() == Some(cookies.as_path()))
            .times(1)
            .returning(|_| {
                Ok(ExtractOutput {
                    files: vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
                    failed_entries: vec!["ERROR: [youtube] x: Private video".to_string()],
                })
            });

        let (dispatcher, _root) = fx.build();
        let extraction = dispatcher
            .dispatch("https://www.youtube.com/playlist?list=PL1", &work)
            .await
            .expect("dispatch");
        assert_eq!(
            files_of(&extraction),
            vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")]
        );
        assert_eq!(extraction.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_youtube_cookie_file_is_skipped() {
        let mut fx = Fixture::new();
        let work = fx.work();
        fx.options.youtube_cookies_file = Some(fx.root.path().join("absent.txt"));

        fx.extractor
            .expect_extract()
            .withf(|req| req.cookie_file.is_none())
            .times(1)
            .returning(|_| Err(ProviderError::Failed("ERROR: Video unavailable".to_string())));

        let (dispatcher, _root) = fx.build();
        let err = dispatcher
            .dispatch("https://youtu.be/abc", &work)
            .await
            .expect_err("should fail");
        assert!(matches!(err, DownloadError::ExtractionFailed(ref m) if m == "ERROR: Video unavailable"));
    }

    #[tokio::test]
    async fn test_facebook_video_delegates_to_generic() {
        let mut fx = Fixture::new();
        let work = fx.work();
        let url = "https://www.facebook.com/watch/?v=123";

        fx.facebook
            .expect_first_post()
            .with(eq(url))
            .times(1)
            .returning(|_| {
                Ok(Some(FacebookPost {
                    video: Some("https://video.example/v.mp4".to_string()),
                    image: Some("https://img.example/thumb.jpg".to_string()),
                }))
            });
        fx.extractor
            .expect_extract()
            .withf(move |req| req.url == url)
            .times(1)
            .returning(|_| {
                Ok(ExtractOutput {
                    files: vec![PathBuf::from("v.mp4")],
                    failed_entries: vec![],
                })
            });

        let (dispatcher, _root) = fx.build();
        let extraction = dispatcher.dispatch(url, &work).await.expect("dispatch");
        assert_eq!(files_of(&extraction), vec![PathBuf::from("v.mp4")]);
    }

    #[tokio::test]
    async fn test_facebook_image_is_forwarded_by_url() {
        let mut fx = Fixture::new();
        let work = fx.work();

        fx.facebook.expect_first_post().with(always()).times(1).returning(|_| {
            Ok(Some(FacebookPost {
                video: None,
                image: Some("https://img.example/p.jpg".to_string()),
            }))
        });
        fx.extractor.expect_extract().never();

        let (dispatcher, _root) = fx.build();
        let extraction = dispatcher
            .dispatch("https://fb.watch/abc/", &work)
            .await
            .expect("dispatch");
        assert_eq!(
            extraction.items,
            vec![MediaItem::PhotoUrl("https://img.example/p.jpg".to_string())]
        );
    }

    #[tokio::test]
    async fn test_facebook_nothing_found_is_empty_result() {
        let mut fx = Fixture::new();
        let work = fx.work();
        fx.facebook.expect_first_post().times(1).returning(|_| Ok(None));

        let (dispatcher, _root) = fx.build();
        let err = dispatcher
            .dispatch("https://m.facebook.com/story.php?id=1", &work)
            .await
            .expect_err("should be empty");
        assert!(matches!(err, DownloadError::EmptyResult));
    }
}
