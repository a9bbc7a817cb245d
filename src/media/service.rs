use super::{find_media_url, ChatSink, Dispatcher, DownloadError, MediaRelay, Strategy, WorkArea};
use crate::config::DOWNLOADING_MESSAGE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

/// What a successful request delivered
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Items sent to the chat
    pub sent: usize,
    /// Playlist entries that could not be downloaded
    pub skipped: Vec<String>,
}

/// Classify, extract and relay the media of one incoming text.
pub struct DownloadService {
    dispatcher: Dispatcher,
    relay: MediaRelay,
    work_root: PathBuf,
    extraction_timeout: Duration,
}

impl DownloadService {
    /// Create a service keeping per-request work areas under `work_root`
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        relay: MediaRelay,
        work_root: impl Into<PathBuf>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            relay,
            work_root: work_root.into(),
            extraction_timeout,
        }
    }

    /// Handle one text message end to end.
    ///
    /// Nothing is sent when the text holds no supported link. Otherwise a
    /// progress notice goes out first, then the media. The request's work
    /// area is gone by the time this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`DownloadError`] describing why the request did not
    /// complete; formatting it for the user is up to the caller.
    pub async fn handle_text(
        &self,
        text: &str,
        sink: &dyn ChatSink,
    ) -> Result<DownloadReport, DownloadError> {
        let url = find_media_url(text).ok_or(DownloadError::NoMatch)?;
        let strategy = Strategy::for_url(url);

        if let Err(e) = sink.send_text(DOWNLOADING_MESSAGE).await {
            warn!(error = %e, "Failed to send progress notice");
        }

        let work = WorkArea::create(&self.work_root)?;
        let span = info_span!(
            "download",
            request_id = %work.request_id(),
            url,
            strategy = strategy.name()
        );

        let result = async {
            info!("Download started");
            let extraction = tokio::time::timeout(
                self.extraction_timeout,
                self.dispatcher.dispatch(url, work.path()),
            )
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.extraction_timeout.as_secs(), "Extraction timed out");
                DownloadError::Timeout {
                    stage: "extracting",
                    after: self.extraction_timeout,
                }
            })??;

            if extraction.items.is_empty() {
                return Err(DownloadError::ExtractionFailed(
                    "no media was produced".to_string(),
                ));
            }

            let sent = self.relay.relay(extraction.items, sink).await?;
            info!(sent, skipped = extraction.skipped.len(), "Download finished");
            Ok(DownloadReport {
                sent,
                skipped: extraction.skipped,
            })
        }
        .instrument(span)
        .await;

        drop(work);
        result
    }
}
