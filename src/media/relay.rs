use super::{ChatSink, DownloadError, MediaItem, MediaKind};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends produced media to the chat, one item at a time, in order.
#[derive(Debug, Clone)]
pub struct MediaRelay {
    upload_timeout: Duration,
}

impl MediaRelay {
    /// Create a relay bounding each upload by `upload_timeout`
    #[must_use]
    pub const fn new(upload_timeout: Duration) -> Self {
        Self { upload_timeout }
    }

    /// Relay `items` through `sink` and return how many were sent.
    ///
    /// Every local file is deleted right after its send attempt. On the
    /// first failure the remaining local files are deleted unsent.
    ///
    /// # Errors
    ///
    /// Returns `RelayFailed` if the sink rejects an item, or `Timeout` if an
    /// upload exceeds the bound.
    pub async fn relay(
        &self,
        items: Vec<MediaItem>,
        sink: &dyn ChatSink,
    ) -> Result<usize, DownloadError> {
        let mut sent = 0;
        let mut items = items.into_iter();

        while let Some(item) = items.next() {
            let result = self.send_one(&item, sink).await;
            if let MediaItem::File(path) = &item {
                remove_local(path).await;
            }

            if let Err(e) = result {
                for rest in items {
                    if let MediaItem::File(path) = &rest {
                        remove_local(path).await;
                    }
                }
                return Err(e);
            }
            sent += 1;
        }

        info!(sent, "Media relayed");
        Ok(sent)
    }

    async fn send_one(&self, item: &MediaItem, sink: &dyn ChatSink) -> Result<(), DownloadError> {
        let send = async {
            match item {
                MediaItem::File(path) => {
                    let kind = MediaKind::from_path(path);
                    debug!(path = %path.display(), ?kind, "Uploading file");
                    sink.send_media(kind, path).await
                }
                MediaItem::PhotoUrl(url) => {
                    debug!(url = %url, "Forwarding photo by URL");
                    sink.send_photo_url(url).await
                }
            }
        };

        match tokio::time::timeout(self.upload_timeout, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "Upload failed");
                Err(DownloadError::RelayFailed(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_secs = self.upload_timeout.as_secs(), "Upload timed out");
                Err(DownloadError::Timeout {
                    stage: "uploading",
                    after: self.upload_timeout,
                })
            }
        }
    }
}

async fn remove_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove relayed file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::sink::MockChatSink;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::path::PathBuf;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").expect("write");
        path
    }

    #[tokio::test]
    async fn test_relays_in_order_by_kind_and_deletes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let video = touch(dir.path(), "clip.mp4");
        let photo = touch(dir.path(), "pic.JPG");
        let doc = touch(dir.path(), "song.m4a");

        let mut sink = MockChatSink::new();
        let mut seq = Sequence::new();
        sink.expect_send_media()
            .with(eq(MediaKind::Video), eq(video.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        sink.expect_send_media()
            .with(eq(MediaKind::Photo), eq(photo.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        sink.expect_send_photo_url()
            .with(eq("https://cdn.example/img.jpg"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_send_media()
            .with(eq(MediaKind::Document), eq(doc.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let items = vec![
            MediaItem::File(video),
            MediaItem::File(photo),
            MediaItem::PhotoUrl("https://cdn.example/img.jpg".to_string()),
            MediaItem::File(doc),
        ];

        let relay = MediaRelay::new(Duration::from_secs(5));
        let sent = relay.relay(items, &sink).await.expect("relay");
        assert_eq!(sent, 4);
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test]
    async fn test_failure_still_deletes_every_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = touch(dir.path(), "a.mp4");
        let second = touch(dir.path(), "b.mp4");

        let mut sink = MockChatSink::new();
        sink.expect_send_media()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("file too big")));

        let relay = MediaRelay::new(Duration::from_secs(5));
        let err = relay
            .relay(vec![MediaItem::File(first), MediaItem::File(second)], &sink)
            .await
            .expect_err("should fail");

        assert!(matches!(err, DownloadError::RelayFailed(ref m) if m == "file too big"));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_timeout() {
        struct StuckSink;

        #[async_trait::async_trait]
        impl ChatSink for StuckSink {
            async fn send_text(&self, _text: &str) -> anyhow::Result<()> {
                Ok(())
            }
            async fn send_media(&self, _kind: MediaKind, _path: &Path) -> anyhow::Result<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
            async fn send_photo_url(&self, _url: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let file = touch(dir.path(), "slow.webm");

        let relay = MediaRelay::new(Duration::from_secs(3));
        let err = relay
            .relay(vec![MediaItem::File(file.clone())], &StuckSink)
            .await
            .expect_err("should time out");

        assert!(matches!(err, DownloadError::Timeout { stage: "uploading", .. }));
        assert!(!file.exists());
    }
}
