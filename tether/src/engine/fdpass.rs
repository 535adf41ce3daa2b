//! Descriptor-passing engine.
//!
//! Moves bytes with `sendmsg`/`recvmsg` so that open file descriptors can
//! travel alongside the payload as `SCM_RIGHTS` ancillary data. Descriptors
//! arriving during ordinary reads are parked in a bounded pending queue and
//! served to the caller by [`DescriptorChannel::receive_descriptor`].

use std::collections::VecDeque;
use std::io::{IoSlice, IoSliceMut};
use std::mem::MaybeUninit;
use std::os::fd::{BorrowedFd, OwnedFd};

use rustix::io::{self, Errno};
use rustix::net::{
    recvmsg, sendmsg, RecvAncillaryBuffer, RecvAncillaryMessage, RecvFlags, SendAncillaryBuffer,
    SendAncillaryMessage, SendFlags,
};

use crate::session::types::TransportMode;
use crate::trace::warn;

use super::{DescriptorChannel, Engine};

/// Most descriptors held in the pending queue at once. Arrivals beyond the
/// bound are closed rather than queued.
const FD_BACKLOG: usize = 8;

/// Ancillary space for one receive: up to `FD_BACKLOG` descriptors.
const ANCILLARY_SPACE: usize = rustix::cmsg_space!(ScmRights(FD_BACKLOG));

/// A descriptor is always sent with one byte of real payload so the peer's
/// read cannot observe a zero-length result.
const CARRIER: &[u8] = b"\0";

/// Engine for transports that pass file descriptors.
///
/// Byte reads and writes behave like the plain stream engine, but every
/// receive also harvests any `SCM_RIGHTS` payload into the pending queue.
#[derive(Debug, Default)]
pub struct FdPassingEngine {
    pending: VecDeque<OwnedFd>,
}

impl FdPassingEngine {
    /// Creates a descriptor-passing engine with an empty pending queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of received descriptors not yet claimed by the caller.
    #[must_use]
    pub fn pending_descriptors(&self) -> usize {
        self.pending.len()
    }

    /// Receives into `buf`, harvesting any ancillary descriptors.
    fn recv_harvesting(&mut self, socket: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
        let mut space = [MaybeUninit::<u8>::uninit(); ANCILLARY_SPACE];
        let mut ancillary = RecvAncillaryBuffer::new(&mut space);

        let msg = io::retry_on_intr(|| {
            recvmsg(
                socket,
                &mut [IoSliceMut::new(&mut *buf)],
                &mut ancillary,
                RecvFlags::empty(),
            )
        })?;

        for message in ancillary.drain() {
            if let RecvAncillaryMessage::ScmRights(fds) = message {
                for fd in fds {
                    if self.pending.len() < FD_BACKLOG {
                        self.pending.push_back(fd);
                    } else {
                        // Queue is full: close the descriptor instead of
                        // leaking it.
                        warn!("descriptor backlog full, dropping received descriptor");
                        drop(fd);
                    }
                }
            }
        }

        Ok(msg.bytes)
    }
}

impl Engine for FdPassingEngine {
    fn read(&mut self, socket: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
        self.recv_harvesting(socket, buf)
    }

    fn write(&mut self, socket: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
        io::retry_on_intr(|| {
            sendmsg(
                socket,
                &[IoSlice::new(buf)],
                &mut SendAncillaryBuffer::default(),
                SendFlags::empty(),
            )
        })
    }

    fn mode(&self) -> TransportMode {
        TransportMode::DescriptorPassing
    }

    fn descriptors(&mut self) -> Option<&mut dyn DescriptorChannel> {
        Some(self)
    }

    fn release(&mut self) {
        // Closes every descriptor still parked in the queue.
        self.pending.clear();
    }
}

impl DescriptorChannel for FdPassingEngine {
    fn send_descriptor(&mut self, socket: BorrowedFd<'_>, fd: BorrowedFd<'_>) -> io::Result<()> {
        let mut space = [MaybeUninit::<u8>::uninit(); ANCILLARY_SPACE];
        let mut ancillary = SendAncillaryBuffer::new(&mut space);
        let fds = [fd];
        if !ancillary.push(SendAncillaryMessage::ScmRights(&fds)) {
            return Err(Errno::NOMEM);
        }

        io::retry_on_intr(|| {
            sendmsg(
                socket,
                &[IoSlice::new(CARRIER)],
                &mut ancillary,
                SendFlags::empty(),
            )
        })
        .map(|_| ())
    }

    fn receive_descriptor(&mut self, socket: BorrowedFd<'_>) -> io::Result<OwnedFd> {
        if self.pending.is_empty() {
            // Pull one carrier message; its descriptor(s) land in the queue.
            let mut carrier = [0u8; 1];
            self.recv_harvesting(socket, &mut carrier)?;
        }
        self.pending.pop_front().ok_or(Errno::NODATA)
    }
}
