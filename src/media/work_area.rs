use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Uniquely named directory holding the files of one request.
///
/// The directory and everything in it is removed when the value is dropped,
/// on success, error or cancellation alike.
#[derive(Debug)]
pub struct WorkArea {
    dir: Option<TempDir>,
    path: PathBuf,
    request_id: Uuid,
}

impl WorkArea {
    /// Create a fresh work area under `root`, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let request_id = Uuid::new_v4();
        let dir = tempfile::Builder::new()
            .prefix(&format!("req-{}-", request_id.as_simple()))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!(request_id = %request_id, path = %path.display(), "Work area created");
        Ok(Self {
            dir: Some(dir),
            path,
            request_id,
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifier used to correlate logs of this request
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Number of entries currently in the directory
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be read.
    pub fn entry_count(&self) -> io::Result<usize> {
        Ok(std::fs::read_dir(&self.path)?.count())
    }

    /// Remove the directory now, reporting failures instead of logging them.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if recursive removal fails.
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(
                    request_id = %self.request_id,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove work area"
                );
            }
        }
    }
}
