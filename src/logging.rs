//! Tracing subscriber setup
//!
//! Every formatted event goes through [`mask_secrets`] before it reaches
//! stderr, so neither the bot token nor a stored Instagram session id ends up
//! in the logs.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::io::{self, Stderr, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset and debug mode is off
const DEFAULT_FILTER: &str = "oxide_media_bot=info,teloxide=warn,hyper=warn,reqwest=warn,axum=warn";

/// `bot<id>:<secret>`, as found in Bot API request URLs
static BOT_PREFIXED_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(bot)[0-9]{6,}:[A-Za-z0-9_-]+");

/// Token printed without the `bot` prefix
static BARE_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b");

/// Session cookie, in header (`sessionid=`) or cookie-jar (`sessionid\t`) form
static SESSION_COOKIE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r#"(sessionid[=\t])[^\s;&"']+"#);

/// Replace credentials in `line` with placeholders
#[must_use]
pub fn mask_secrets(line: &str) -> String {
    let rules: [(&regex::Regex, &str); 3] = [
        (&BOT_PREFIXED_TOKEN, "${1}[TELEGRAM_TOKEN]"),
        (&BARE_TOKEN, "[TELEGRAM_TOKEN]"),
        (&SESSION_COOKIE, "${1}[MASKED]"),
    ];
    rules
        .iter()
        .fold(line.to_owned(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}

/// Writer that masks secrets before forwarding to `W`
pub struct MaskingWriter<W>(W);

impl<W: Write> Write for MaskingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let masked = mask_secrets(&String::from_utf8_lossy(buf));
        self.0.write_all(masked.as_bytes())?;
        // The caller handed over all of `buf`, whatever length the masked text has
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Stderr with secrets masked
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskedStderr;

impl<'a> MakeWriter<'a> for MaskedStderr {
    type Writer = MaskingWriter<Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        MaskingWriter(io::stderr())
    }
}

/// `DEBUG_MODE=true` or `DEBUG_MODE=1`
#[must_use]
pub fn debug_mode_from_env() -> bool {
    std::env::var("DEBUG_MODE").is_ok_and(|v| v == "true" || v == "1")
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` selects between a crate-wide
/// `debug` level and the quiet default.
pub fn init(debug: bool) {
    let fallback = if debug { "debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(MaskedStderr))
        .init();
}
