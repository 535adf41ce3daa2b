//! Greeting handshake.
//!
//! Immediately after a client connects, the server sends exactly one line:
//! a line beginning with the affirmative marker `OK` accepts the session
//! (any following text is a banner), anything else rejects it. This module
//! owns that single-shot exchange: reading one line through the installed
//! engine and classifying it. The command/response loop that follows the
//! greeting belongs to the layer above.

use std::os::fd::BorrowedFd;

use rustix::io::Errno;
use thiserror::Error;

use crate::engine::Engine;
use crate::trace::trace;

/// Longest greeting line the protocol permits: 1000 characters plus the
/// line terminator.
pub(crate) const MAX_GREETING_LEN: usize = 1002;

/// Errors produced while reading the greeting line.
///
/// These pass through the connect path unchanged; they are never
/// reclassified into another error class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GreetingError {
    /// The engine-level read failed.
    #[error("greeting read failed: {0}")]
    Io(Errno),
    /// The greeting line exceeded the protocol line limit.
    #[error("greeting line exceeds {MAX_GREETING_LEN} bytes")]
    LineTooLong,
    /// The peer closed the connection before completing the greeting.
    #[error("connection closed before the greeting completed")]
    Disconnected,
}

/// A classified greeting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Greeting {
    /// The server accepted the session.
    Accepted {
        /// Banner text following the affirmative marker, if any.
        banner: Option<String>,
    },
    /// The server refused the session.
    Rejected {
        /// Sanitized diagnostic text taken from the line.
        diagnostic: String,
    },
}

impl Greeting {
    /// Classifies one greeting line.
    ///
    /// `OK` alone or followed by text accepts; every other line rejects.
    /// Rejection lines of the form `ERR <code> <text>` surface `<text>` as
    /// the diagnostic; otherwise the whole line is the diagnostic.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        if line == "OK" {
            return Self::Accepted { banner: None };
        }
        if let Some(rest) = line.strip_prefix("OK ") {
            let banner = rest.trim();
            return Self::Accepted {
                banner: (!banner.is_empty()).then(|| sanitize(banner)),
            };
        }
        Self::Rejected {
            diagnostic: diagnostic_text(line),
        }
    }
}

/// Extracts the human-readable part of a rejection line.
fn diagnostic_text(line: &str) -> String {
    if let Some(rest) = line.strip_prefix("ERR") {
        if rest.is_empty() || rest.starts_with(' ') {
            let rest = rest.trim_start();
            let (code, tail) = match rest.split_once(' ') {
                Some((code, tail)) => (code, tail.trim_start()),
                None => (rest, ""),
            };
            if code.bytes().all(|b| b.is_ascii_digit()) {
                if !tail.is_empty() {
                    return sanitize(tail);
                }
            } else if !rest.is_empty() {
                return sanitize(rest);
            }
        }
    }
    sanitize(line)
}

/// Escapes control bytes so server-supplied text is safe to surface in
/// error messages and logs.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_control() {
            for byte in ch.encode_utf8(&mut [0u8; 4]).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Reads and classifies the server's greeting line through `engine`.
///
/// Issues blocking reads until one full line arrives. The line may be
/// terminated by `\n` or `\r\n`; invalid UTF-8 is replaced rather than
/// rejected, matching how the diagnostic is only ever surfaced as text.
pub(crate) fn read_greeting(
    engine: &mut dyn Engine,
    socket: BorrowedFd<'_>,
) -> Result<Greeting, GreetingError> {
    let mut buf = [0u8; MAX_GREETING_LEN];
    let mut filled = 0;

    loop {
        if filled == buf.len() {
            return Err(GreetingError::LineTooLong);
        }

        let n = engine
            .read(socket, &mut buf[filled..])
            .map_err(GreetingError::Io)?;
        if n == 0 {
            return Err(GreetingError::Disconnected);
        }

        let scan_from = filled;
        filled += n;

        if let Some(pos) = buf[scan_from..filled].iter().position(|&b| b == b'\n') {
            let line = &buf[..scan_from + pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let text = String::from_utf8_lossy(line);
            trace!(line = %text, "greeting received");
            return Ok(Greeting::classify(&text));
        }
    }
}
