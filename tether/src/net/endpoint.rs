//! Validated local-socket endpoints.
//!
//! An endpoint identifier is a filesystem path to a local-domain socket,
//! optionally preceded by a single-character driver designator and a colon
//! (`u:/run/agent.sock`). The designator is reserved for selecting
//! alternative transport drivers and is stripped before the path is used.

use std::fmt;

use rustix::net::SocketAddrUnix;
use thiserror::Error;

/// Errors produced while validating an endpoint identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The endpoint string is empty.
    #[error("endpoint is empty")]
    Empty,
    /// The path (after any driver prefix) does not start with `/`.
    #[error("endpoint path must be absolute")]
    NotAbsolute,
    /// The encoded path does not fit in a local socket address.
    #[error("endpoint path does not fit in a local socket address")]
    TooLong,
}

/// A validated local-socket endpoint.
///
/// Wraps the prefix-stripped socket path together with the prebuilt socket
/// address, so the connect path never re-parses or re-validates. Construction
/// performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    driver: Option<char>,
    path: String,
    addr: SocketAddrUnix,
}

impl Endpoint {
    /// Parses and validates an endpoint identifier.
    ///
    /// The identifier must be non-empty and, after skipping an optional
    /// two-character driver prefix, must begin with `/`. The encoded path
    /// must fit the platform's local-socket address capacity including its
    /// terminator (about 108 bytes on Linux).
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if any of the checks above fail.
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        if raw.is_empty() {
            return Err(EndpointError::Empty);
        }

        // An optional driver designator is a single character followed by a
        // colon. The colon at byte 1 forces byte 0 to be ASCII, so slicing
        // at 2 stays on a char boundary.
        let bytes = raw.as_bytes();
        let (driver, path) = if bytes.len() >= 2 && bytes[1] == b':' {
            (Some(bytes[0] as char), &raw[2..])
        } else {
            (None, raw)
        };

        if !path.starts_with('/') {
            return Err(EndpointError::NotAbsolute);
        }

        // The platform itself knows the sun_path capacity; building the
        // address here keeps the length check exact and the connect path
        // infallible on addressing.
        let addr = SocketAddrUnix::new(path).map_err(|_| EndpointError::TooLong)?;

        Ok(Self {
            driver,
            path: path.to_owned(),
            addr,
        })
    }

    /// Returns the prefix-stripped socket path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the driver designator, if the identifier carried one.
    #[must_use]
    pub const fn driver(&self) -> Option<char> {
        self.driver
    }

    /// Returns the prebuilt socket address for this endpoint.
    #[must_use]
    pub(crate) const fn as_socket_addr(&self) -> &SocketAddrUnix {
        &self.addr
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.driver {
            Some(d) => write!(f, "{d}:{}", self.path),
            None => f.write_str(&self.path),
        }
    }
}
