//! Instagram session credential storage
//!
//! The credential is kept as the raw session id, the only content of a single
//! file. The `sessionid=<value>` cookie form is produced in memory when a
//! request needs it.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Cookie name Instagram uses for the session id
pub const SESSION_COOKIE_NAME: &str = "sessionid";

/// Errors that can occur while touching the session file
#[derive(Error, Debug)]
pub enum SessionError {
    /// The credential passed to `set` was empty
    #[error("session id must not be empty")]
    Empty,
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque session credential for the Instagram platform
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    /// Wrap a raw session id
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw session id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Cookie` header value carrying this session
    #[must_use]
    pub fn cookie_header(&self) -> String {
        format!("{SESSION_COOKIE_NAME}={}", self.0)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential([MASKED])")
    }
}

/// Outcome of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// A stored session was removed
    Deleted,
    /// Nothing was stored
    NotFound,
}

/// File-backed store for the single session credential
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Create a store backed by `path`. The file is not touched.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored credential with `credential`, verbatim.
    ///
    /// The value is written to a sibling temp file and renamed over the
    /// target so readers never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty value, or an I/O error.
    pub async fn set(&self, credential: &str) -> Result<(), SessionError> {
        if credential.is_empty() {
            return Err(SessionError::Empty);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.tmp_path();
        if let Err(e) = tokio::fs::write(&tmp, credential.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(path = %self.path.display(), "Session id saved");
        Ok(())
    }

    /// Remove the stored credential if present.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than "not found".
    pub async fn delete(&self) -> Result<DeleteOutcome, SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Session id deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session id to delete");
                Ok(DeleteOutcome::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the stored credential, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than "not found".
    pub async fn load(&self) -> Result<Option<SessionCredential>, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(SessionCredential(value))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "session".into(), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().as_simple()))
    }
}
