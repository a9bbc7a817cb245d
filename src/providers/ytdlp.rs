//! YT-DLP Provider - generic media extraction via the yt-dlp executable
//!
//! Runs yt-dlp as a subprocess with a fixed output template and format
//! selection, and reads back the final path of every produced file from
//! `--print after_move:filepath`, one line per file, in production order.

use super::{ExtractOutput, ExtractRequest, MediaExtractor, ProviderError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

/// Patterns indicating fatal, unrecoverable yt-dlp errors
const FATAL_ERROR_PATTERNS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "Sign in to confirm your age",
    "age-restricted",
    "members-only",
    "This video is private",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "copyright",
    "terminated account",
    "ERROR: Unsupported URL",
    "is not a valid URL",
    "Unable to extract",
    "Premieres in",
    "This live event will begin",
    "HTTP Error 403",
    "HTTP Error 404",
    "login required",
    "Requested content is not available",
];

/// Patterns indicating transient errors that might be resolved with retry
const RETRYABLE_ERROR_PATTERNS: &[&str] = &[
    "Connection reset",
    "Connection timed out",
    "Unable to download webpage",
    "HTTP Error 429", // Too Many Requests
    "HTTP Error 503", // Service Unavailable
    "Read timed out",
    "network is unreachable",
    "Temporary failure in name resolution",
];

/// Output naming template, relative to the request directory
pub const OUTPUT_TEMPLATE: &str = "%(title).70s.%(ext)s";

/// Best available video+audio, falling back to best single file
pub const FORMAT_SELECTOR: &str = "bestvideo+bestaudio/best";

/// Retries after the first attempt on transient errors
const TRANSIENT_RETRIES: usize = 1;
const RETRY_INITIAL_BACKOFF_MS: u64 = 1000;
const RETRY_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Check if error message indicates a fatal, unrecoverable error
fn is_fatal_ytdlp_error(error_msg: &str) -> bool {
    FATAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// Check if error message indicates a retryable error
fn is_retryable_ytdlp_error(error_msg: &str) -> bool {
    RETRYABLE_ERROR_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}

/// yt-dlp subprocess extractor
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    /// Create an extractor invoking `program` (a path or a name on `PATH`)
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `request`
    #[must_use]
    pub fn build_args(request: &ExtractRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--no-simulate",
            "--print",
            "after_move:filepath",
            "--no-progress",
            "--no-warnings",
            "--format",
            FORMAT_SELECTOR,
            "--output",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(request.output_dir.join(OUTPUT_TEMPLATE).into_os_string());

        if request.expand_playlists {
            args.push("--yes-playlist".into());
            args.push("--ignore-errors".into());
        } else {
            args.push("--no-playlist".into());
        }

        if let Some(ref cookies) = request.cookie_file {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    async fn run_once(&self, request: &ExtractRequest) -> Result<ExtractOutput, ProviderError> {
        let args = Self::build_args(request);
        debug!(program = %self.program, url = %request.url, "Executing yt-dlp");

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_output(output.status.success(), &stdout, &stderr)
    }
}

#[async_trait]
impl MediaExtractor for YtDlp {
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractOutput, ProviderError> {
        let strategy = ExponentialBackoff::from_millis(RETRY_INITIAL_BACKOFF_MS)
            .max_delay(RETRY_MAX_BACKOFF)
            .map(jitter)
            .take(TRANSIENT_RETRIES);

        let output = RetryIf::spawn(
            strategy,
            || self.run_once(request),
            |e: &ProviderError| {
                let retry = e.is_transient();
                if retry {
                    warn!(error = %e, "Retryable yt-dlp error detected");
                }
                retry
            },
        )
        .await?;

        if !output.failed_entries.is_empty() {
            warn!(
                failed = output.failed_entries.len(),
                produced = output.files.len(),
                "Playlist partially downloaded"
            );
        }
        info!(files = output.files.len(), url = %request.url, "yt-dlp finished");
        Ok(output)
    }
}

/// `ERROR:` lines of yt-dlp stderr
fn error_lines(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .map(ToString::to_string)
        .collect()
}

/// Interpret one yt-dlp run.
///
/// A failing run that still produced files is a partial success: the files
/// are kept and the error lines reported per entry.
fn parse_output(success: bool, stdout: &str, stderr: &str) -> Result<ExtractOutput, ProviderError> {
    let files: Vec<_> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(std::path::PathBuf::from)
        .collect();
    let errors = error_lines(stderr);

    if !files.is_empty() {
        return Ok(ExtractOutput {
            files,
            failed_entries: errors,
        });
    }

    if success {
        return Err(ProviderError::Failed(
            "yt-dlp finished without producing any file".to_string(),
        ));
    }

    let error_msg = if errors.is_empty() {
        let trimmed = stderr.trim();
        if trimmed.is_empty() {
            "yt-dlp exited with an error".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        errors.join("\n")
    };

    if is_fatal_ytdlp_error(&error_msg) {
        warn!(error = %error_msg, "Fatal yt-dlp error detected");
        Err(ProviderError::Failed(error_msg))
    } else if is_retryable_ytdlp_error(&error_msg) {
        Err(ProviderError::Transient(error_msg))
    } else {
        Err(ProviderError::Failed(error_msg))
    }
}
