//! Pluggable I/O engines for a connected context.
//!
//! An engine is the set of transport operations installed into a
//! [`Context`](crate::Context) once the socket connect succeeds. The
//! byte-stream engine moves plain bytes; the descriptor-passing engine
//! additionally transfers open file descriptors alongside the byte stream.
//! Which one is installed is decided by value at installation time via
//! [`TransportMode`](crate::TransportMode); descriptor operations are
//! absent from the byte-stream engine, not stubbed.
//!
//! Engines do not own the connected descriptor; the context does. Every
//! operation borrows the descriptor it acts on.

pub mod fdpass;
pub mod stream;

use std::fmt;
use std::os::fd::{BorrowedFd, OwnedFd};

use rustix::io;

use crate::session::types::TransportMode;

pub use fdpass::FdPassingEngine;
pub use stream::StreamEngine;

/// Transport operations bound to a connected context.
pub trait Engine: fmt::Debug + Send {
    /// Reads bytes from the connection into `buf`.
    ///
    /// Returns the number of bytes read; zero means the peer closed the
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying errno on I/O failure.
    fn read(&mut self, socket: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes bytes from `buf` to the connection.
    ///
    /// # Errors
    ///
    /// Returns the underlying errno on I/O failure.
    fn write(&mut self, socket: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize>;

    /// The transport mode this engine implements.
    fn mode(&self) -> TransportMode;

    /// Descriptor-passing operations, when the transport supports them.
    fn descriptors(&mut self) -> Option<&mut dyn DescriptorChannel> {
        None
    }

    /// Releases auxiliary transport state during teardown.
    ///
    /// Invoked exactly once per teardown by the owning context, before the
    /// descriptor pair is closed. Must be a no-op when there is nothing to
    /// release.
    fn release(&mut self) {}
}

/// Descriptor transfer over a connected local socket.
///
/// Implemented only by engines whose transport can carry open file
/// descriptors alongside ordinary byte data.
pub trait DescriptorChannel {
    /// Sends `fd` to the peer over `socket`.
    ///
    /// # Errors
    ///
    /// Returns the underlying errno on I/O failure.
    fn send_descriptor(&mut self, socket: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> io::Result<()>;

    /// Receives a file descriptor from the peer over `socket`.
    ///
    /// # Errors
    ///
    /// Returns the underlying errno on I/O failure, or `ENODATA` if the
    /// peer's message carried no descriptor.
    fn receive_descriptor(&mut self, socket: BorrowedFd<'_>) -> io::Result<OwnedFd>;
}
