//! Session types: transport modes, server hints, and the connect error
//! taxonomy.

use std::fmt;

use rustix::io::Errno;
use thiserror::Error;

use crate::net::EndpointError;
use crate::session::handshake::GreetingError;

/// Transport mode selected when a connection is established.
///
/// Decides which I/O engine is installed into the context after the socket
/// connect succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportMode {
    /// Plain byte-stream I/O.
    #[default]
    ByteStream,
    /// Byte-stream I/O that can also transfer open file descriptors.
    DescriptorPassing,
}

/// Opaque identifier of the process expected to own the server socket.
///
/// Reserved for future use: recorded in trace output during connect but
/// never otherwise consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerHint(u32);

impl ServerHint {
    /// Creates a hint from a raw process identifier.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self(pid)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for ServerHint {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}

impl fmt::Display for ServerHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a server connection could not be established.
///
/// Both legs classify as [`ConnectError::ConnectFailed`]; the reason records
/// which one failed.
#[derive(Debug, Clone)]
pub enum ConnectFailure {
    /// The socket-layer connect did not succeed.
    Syscall(Errno),
    /// The server's greeting refused the session.
    Refused {
        /// Sanitized diagnostic text taken from the greeting line.
        diagnostic: String,
    },
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syscall(errno) => write!(f, "{errno}"),
            Self::Refused { diagnostic } if diagnostic.is_empty() => {
                f.write_str("server rejected the connection")
            }
            Self::Refused { diagnostic } => {
                write!(f, "server rejected the connection: {diagnostic}")
            }
        }
    }
}

/// Errors returned by a connect attempt.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// The endpoint identifier failed validation.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
    /// The context already holds a live connection.
    #[error("context already holds a live connection")]
    AlreadyConnected,
    /// The local socket could not be allocated.
    #[error("cannot create local socket: {0}")]
    Socket(Errno),
    /// The server could not be reached, or its greeting refused the session.
    #[error("cannot connect to server: {0}")]
    ConnectFailed(ConnectFailure),
    /// The greeting line could not be read. Carries the read-layer error
    /// unchanged.
    #[error(transparent)]
    Greeting(#[from] GreetingError),
}

impl ConnectError {
    /// Server-supplied diagnostic text, when the failure carries one.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::ConnectFailed(ConnectFailure::Refused { diagnostic }) => Some(diagnostic),
            _ => None,
        }
    }
}
