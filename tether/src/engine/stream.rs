//! Plain byte-stream engine.

use std::os::fd::BorrowedFd;

use rustix::io;

use crate::session::types::TransportMode;

use super::Engine;

/// The default engine: blocking byte-stream I/O on the connected socket.
///
/// Carries no state of its own; descriptor passing is not available in this
/// mode.
#[derive(Debug, Default)]
pub struct StreamEngine;

impl StreamEngine {
    /// Creates a byte-stream engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Engine for StreamEngine {
    fn read(&mut self, socket: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
        io::retry_on_intr(|| io::read(socket, &mut *buf))
    }

    fn write(&mut self, socket: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
        io::retry_on_intr(|| io::write(socket, buf))
    }

    fn mode(&self) -> TransportMode {
        TransportMode::ByteStream
    }
}
