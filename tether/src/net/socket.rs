//! Blocking local-socket factory.
//!
//! Allocates the connection-oriented local socket and performs the raw
//! connect against a validated [`Endpoint`]. The factory holds no state:
//! the caller owns the returned descriptor and is responsible for releasing
//! it if the connect stage fails (dropping the `OwnedFd` is enough).

use std::os::fd::OwnedFd;

use rustix::io;
use rustix::net::{socket_with, AddressFamily, SocketFlags, SocketType};

use super::Endpoint;

/// Allocates a local-domain, connection-oriented socket descriptor.
///
/// The socket is blocking and close-on-exec. No address is bound and no
/// connection is attempted; on failure nothing is acquired.
///
/// # Errors
///
/// Returns the underlying errno if the operating environment cannot
/// allocate the socket (e.g. descriptor limits reached).
pub fn create_stream() -> io::Result<OwnedFd> {
    socket_with(
        AddressFamily::UNIX,
        SocketType::STREAM,
        SocketFlags::CLOEXEC,
        None,
    )
}

/// Connects `socket` to the server at `endpoint`.
///
/// Blocks until the socket layer accepts or refuses the connection.
///
/// # Errors
///
/// Returns the underlying errno if the connection cannot be established
/// (no server listening, permission denied, ...). The descriptor remains
/// owned by the caller.
pub fn connect(socket: &OwnedFd, endpoint: &Endpoint) -> io::Result<()> {
    rustix::net::connect(socket, endpoint.as_socket_addr())
}
