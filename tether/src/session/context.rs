//! Connection context and connect orchestration.
//!
//! A [`Context`] owns everything a single client-side connection needs: the
//! descriptor pair, the installed I/O engine, the server's greeting banner,
//! and the last classified error. [`Context::connect_with`] sequences
//! endpoint validation, socket creation, engine installation, and the
//! greeting handshake, and enforces the cleanup contract on every failure
//! branch: the caller observes either a fully-ready context or a fully-reset
//! one, never anything in between.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::Arc;
use std::time::Duration;

use rustix::io::{self, Errno};
use rustix::net::sockopt;

use crate::engine::{Engine, FdPassingEngine, StreamEngine};
use crate::net::socket as transport;
use crate::net::Endpoint;
use crate::session::handshake::{self, Greeting};
use crate::session::types::{ConnectError, ConnectFailure, ServerHint, TransportMode};
use crate::trace::{debug, trace};

/// One client-side connection to a local-socket server.
///
/// Created empty, connected in place, and handed to the higher-level
/// command loop once ready. For stream transports the inbound and outbound
/// handles alias the same underlying descriptor; the pair is always closed
/// together, exactly once.
///
/// A context is single-owner: it must not run overlapping connect attempts
/// and is not safe for concurrent use without external synchronization.
#[derive(Debug, Default)]
pub struct Context {
    inbound: Option<Arc<OwnedFd>>,
    outbound: Option<Arc<OwnedFd>>,
    engine: Option<Box<dyn Engine>>,
    greeting: Option<String>,
    last_error: Option<ConnectError>,
}

impl Context {
    /// Creates an empty context: both handles closed, no engine installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to the server at `endpoint` with the default byte-stream
    /// transport and no server hint.
    ///
    /// # Errors
    ///
    /// See [`Context::connect_with`].
    pub fn connect(&mut self, endpoint: &str) -> Result<(), ConnectError> {
        self.connect_with(endpoint, None, TransportMode::ByteStream)
    }

    /// Connects to the server at `endpoint`.
    ///
    /// Validates the endpoint, creates and connects a local stream socket,
    /// installs the engine selected by `mode`, and reads the server's
    /// one-line greeting. On success the context holds the live connection.
    /// On any failure every resource acquired so far is released, the
    /// context is reset to its freshly-created shape, and the classified
    /// error is also recorded as [`Context::last_error`].
    ///
    /// `server_hint` is reserved: it is recorded in trace output but not
    /// interpreted.
    ///
    /// # Errors
    ///
    /// - [`ConnectError::InvalidEndpoint`]: the endpoint failed validation.
    /// - [`ConnectError::AlreadyConnected`]: this context is not fresh.
    /// - [`ConnectError::Socket`]: the socket could not be allocated.
    /// - [`ConnectError::ConnectFailed`]: the socket-layer connect failed,
    ///   or the server's greeting refused the session.
    /// - [`ConnectError::Greeting`]: the greeting could not be read; the
    ///   read-layer error passes through unchanged.
    pub fn connect_with(
        &mut self,
        endpoint: &str,
        server_hint: Option<ServerHint>,
        mode: TransportMode,
    ) -> Result<(), ConnectError> {
        self.last_error = None;
        let result = self.try_connect(endpoint, server_hint, mode);
        if let Err(err) = &result {
            self.last_error = Some(err.clone());
        }
        result
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn try_connect(
        &mut self,
        raw: &str,
        server_hint: Option<ServerHint>,
        mode: TransportMode,
    ) -> Result<(), ConnectError> {
        if self.engine.is_some() || self.inbound.is_some() || self.outbound.is_some() {
            debug!(endpoint = raw, "connect refused: context already in use");
            return Err(ConnectError::AlreadyConnected);
        }

        let endpoint = Endpoint::parse(raw)?;
        trace!(%endpoint, ?server_hint, ?mode, "connecting");

        let socket = transport::create_stream().map_err(|errno| {
            debug!(%endpoint, %errno, "cannot create socket");
            ConnectError::Socket(errno)
        })?;

        if let Err(errno) = transport::connect(&socket, &endpoint) {
            debug!(%endpoint, %errno, "cannot connect to server");
            // The descriptor was never written into the context; a bare
            // close is the whole cleanup.
            drop(socket);
            return Err(ConnectError::ConnectFailed(ConnectFailure::Syscall(errno)));
        }

        self.install(socket, mode);

        // From here on the context is live; failures go through the full
        // disconnect path, not a bare close.
        let socket = self.inbound.clone().expect("engine just installed");
        let engine = self.engine.as_mut().expect("engine just installed");
        match handshake::read_greeting(engine.as_mut(), socket.as_fd()) {
            Ok(Greeting::Accepted { banner }) => {
                trace!(%endpoint, banner = banner.as_deref().unwrap_or(""), "server accepted connection");
                self.greeting = banner;
                Ok(())
            }
            Ok(Greeting::Rejected { diagnostic }) => {
                debug!(%endpoint, %diagnostic, "server rejected connection");
                self.disconnect();
                Err(ConnectError::ConnectFailed(ConnectFailure::Refused {
                    diagnostic,
                }))
            }
            Err(err) => {
                debug!(%endpoint, %err, "greeting read failed");
                self.disconnect();
                Err(ConnectError::Greeting(err))
            }
        }
    }

    /// Wires the connected descriptor and the engine for `mode` into the
    /// context. Pure data wiring; cannot fail.
    fn install(&mut self, socket: OwnedFd, mode: TransportMode) {
        let socket = Arc::new(socket);
        self.engine = Some(match mode {
            TransportMode::ByteStream => Box::new(StreamEngine::new()) as Box<dyn Engine>,
            TransportMode::DescriptorPassing => Box::new(FdPassingEngine::new()),
        });
        self.inbound = Some(Arc::clone(&socket));
        self.outbound = Some(socket);
    }

    /// Whether the context currently holds a live, greeted connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.engine.is_some() && self.inbound.is_some()
    }

    /// The transport mode of the installed engine, if any.
    #[must_use]
    pub fn transport_mode(&self) -> Option<TransportMode> {
        self.engine.as_ref().map(|engine| engine.mode())
    }

    /// Whether the installed engine can transfer file descriptors.
    #[must_use]
    pub fn supports_descriptor_passing(&self) -> bool {
        matches!(
            self.transport_mode(),
            Some(TransportMode::DescriptorPassing)
        )
    }

    /// Banner text the server sent with its affirmative greeting, if any.
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    /// The most recent classified connect error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&ConnectError> {
        self.last_error.as_ref()
    }

    /// Borrows the inbound descriptor, when open.
    #[must_use]
    pub fn inbound_fd(&self) -> Option<BorrowedFd<'_>> {
        self.inbound.as_deref().map(AsFd::as_fd)
    }

    /// Borrows the outbound descriptor, when open.
    #[must_use]
    pub fn outbound_fd(&self) -> Option<BorrowedFd<'_>> {
        self.outbound.as_deref().map(AsFd::as_fd)
    }

    /// Reads bytes from the connection through the installed engine.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected; otherwise the underlying
    /// errno.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let socket = self.inbound.clone().ok_or(Errno::NOTCONN)?;
        let engine = self.engine.as_mut().ok_or(Errno::NOTCONN)?;
        engine.read(socket.as_fd(), buf)
    }

    /// Writes bytes to the connection through the installed engine.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected; otherwise the underlying
    /// errno.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let socket = self.outbound.clone().ok_or(Errno::NOTCONN)?;
        let engine = self.engine.as_mut().ok_or(Errno::NOTCONN)?;
        engine.write(socket.as_fd(), buf)
    }

    /// Sends an open file descriptor to the server.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected, `EOPNOTSUPP` if the
    /// installed engine does not pass descriptors; otherwise the underlying
    /// errno.
    pub fn send_descriptor(&mut self, fd: BorrowedFd<'_>) -> io::Result<()> {
        let socket = self.outbound.clone().ok_or(Errno::NOTCONN)?;
        let engine = self.engine.as_mut().ok_or(Errno::NOTCONN)?;
        let channel = engine.descriptors().ok_or(Errno::OPNOTSUPP)?;
        channel.send_descriptor(socket.as_fd(), fd)
    }

    /// Receives an open file descriptor from the server.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected, `EOPNOTSUPP` if the
    /// installed engine does not pass descriptors; otherwise the underlying
    /// errno.
    pub fn receive_descriptor(&mut self) -> io::Result<OwnedFd> {
        let socket = self.inbound.clone().ok_or(Errno::NOTCONN)?;
        let engine = self.engine.as_mut().ok_or(Errno::NOTCONN)?;
        let channel = engine.descriptors().ok_or(Errno::OPNOTSUPP)?;
        channel.receive_descriptor(socket.as_fd())
    }

    /// Sets the receive timeout on the connected socket.
    ///
    /// This crate performs no timeout management of its own; callers that
    /// need bounded blocking impose it here, at the socket layer.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected; otherwise the underlying
    /// errno.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let socket = self.inbound.as_ref().ok_or(Errno::NOTCONN)?;
        sockopt::set_socket_timeout(socket, sockopt::Timeout::Recv, timeout)
    }

    /// Sets the send timeout on the connected socket.
    ///
    /// # Errors
    ///
    /// `ENOTCONN` if the context is not connected; otherwise the underlying
    /// errno.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let socket = self.outbound.as_ref().ok_or(Errno::NOTCONN)?;
        sockopt::set_socket_timeout(socket, sockopt::Timeout::Send, timeout)
    }

    /// Closes the inbound/outbound descriptor pair.
    ///
    /// The pair aliases one underlying descriptor, which is closed exactly
    /// once; calling this on an already-closed context is a no-op.
    pub fn finish(&mut self) {
        self.inbound = None;
        self.outbound = None;
    }

    /// Fully tears down the connection: releases auxiliary engine state,
    /// closes the descriptor pair, and returns the context to its
    /// freshly-created shape.
    ///
    /// Idempotent. [`Context::last_error`] survives for inspection.
    pub fn disconnect(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.release();
        }
        self.engine = None;
        self.greeting = None;
        self.finish();
    }
}
