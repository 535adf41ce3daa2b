//! End-to-end connection tests against real local-socket servers.
//!
//! Each test binds a `std::os::unix::net::UnixListener` on a unique
//! temporary path, serves one scripted connection from a thread, and drives
//! the crate's connect path against it.
//!
//! # Running with tracing
//!
//! ```bash
//! RUST_LOG=tether=trace cargo test --features tracing -- --nocapture
//! ```

use std::fs;
use std::io::{BufRead, BufReader, IoSlice, Write};
use std::mem::MaybeUninit;
use std::os::fd::AsFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use rustix::io::Errno;
use rustix::net::{sendmsg, SendAncillaryBuffer, SendAncillaryMessage, SendFlags};

use tether::{ConnectError, ConnectFailure, Context, GreetingError, TransportMode};

/// Generates a unique socket path for this test process.
fn unique_socket_path(suffix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let path = std::env::temp_dir().join(format!(
        "tether-{}-{}-{}.sock",
        std::process::id(),
        suffix,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path.to_str().expect("temp dir is valid UTF-8").to_owned()
}

/// Binds `path` and serves exactly one connection with `handler`.
fn serve_once(
    path: &str,
    handler: impl FnOnce(UnixStream) + Send + 'static,
) -> thread::JoinHandle<()> {
    let _ = fs::remove_file(path);
    let listener = UnixListener::bind(path).expect("bind test socket");
    thread::spawn(move || {
        if let Ok((stream, _addr)) = listener.accept() {
            handler(stream);
        }
    })
}

/// Sends `fd` over `stream` with a one-byte carrier payload.
fn send_fd_from_server(stream: &UnixStream, fd: std::os::fd::BorrowedFd<'_>) {
    let mut space = [MaybeUninit::<u8>::uninit(); rustix::cmsg_space!(ScmRights(1))];
    let mut ancillary = SendAncillaryBuffer::new(&mut space);
    let fds = [fd];
    assert!(ancillary.push(SendAncillaryMessage::ScmRights(&fds)));
    sendmsg(
        stream.as_fd(),
        &[IoSlice::new(b"\0")],
        &mut ancillary,
        SendFlags::empty(),
    )
    .expect("send descriptor");
}

#[test]
fn connect_accepts_greeting_with_banner() {
    let path = unique_socket_path("banner");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK Pleased to meet you\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");

    assert!(ctx.is_connected());
    assert_eq!(ctx.greeting(), Some("Pleased to meet you"));
    assert_eq!(ctx.transport_mode(), Some(TransportMode::ByteStream));
    assert!(!ctx.supports_descriptor_passing());
    assert!(ctx.last_error().is_none());

    // Both handles alias the one connected descriptor.
    let inbound = ctx.inbound_fd().expect("inbound open");
    let outbound = ctx.outbound_fd().expect("outbound open");
    assert_eq!(
        std::os::fd::AsRawFd::as_raw_fd(&inbound),
        std::os::fd::AsRawFd::as_raw_fd(&outbound)
    );

    ctx.disconnect();
    assert!(!ctx.is_connected());
    assert!(ctx.inbound_fd().is_none());
    assert!(ctx.outbound_fd().is_none());

    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn connect_selects_descriptor_passing_engine() {
    let path = unique_socket_path("fdmode");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect_with(&path, None, TransportMode::DescriptorPassing)
        .expect("connect");

    assert!(ctx.is_connected());
    assert_eq!(ctx.greeting(), None);
    assert_eq!(ctx.transport_mode(), Some(TransportMode::DescriptorPassing));
    assert!(ctx.supports_descriptor_passing());

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn descriptor_operations_absent_in_byte_stream_mode() {
    let path = unique_socket_path("nofd");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");

    assert_eq!(ctx.receive_descriptor().unwrap_err(), Errno::OPNOTSUPP);

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn rejection_surfaces_diagnostic_and_resets_context() {
    let path = unique_socket_path("reject");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"ERR 1 access denied\n").unwrap();
    });

    let mut ctx = Context::new();
    let err = ctx.connect(&path).unwrap_err();

    assert!(matches!(
        err,
        ConnectError::ConnectFailed(ConnectFailure::Refused { .. })
    ));
    assert_eq!(err.diagnostic(), Some("access denied"));

    // The cleanup contract ran: handles closed, engine gone, error kept.
    assert!(!ctx.is_connected());
    assert!(ctx.inbound_fd().is_none());
    assert!(ctx.outbound_fd().is_none());
    assert_eq!(ctx.transport_mode(), None);
    assert!(matches!(
        ctx.last_error(),
        Some(ConnectError::ConnectFailed(_))
    ));

    // Closing an already-closed pair must never fault.
    ctx.finish();
    ctx.finish();
    ctx.disconnect();

    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn peer_close_before_greeting_passes_read_error_through() {
    let path = unique_socket_path("close");
    let server = serve_once(&path, drop);

    let mut ctx = Context::new();
    let err = ctx.connect(&path).unwrap_err();

    assert!(matches!(
        err,
        ConnectError::Greeting(GreetingError::Disconnected)
    ));
    assert!(!ctx.is_connected());

    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn greeting_split_across_writes_is_assembled() {
    let path = unique_socket_path("split");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK Plea").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
        stream.write_all(b"sed to meet you\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");
    assert_eq!(ctx.greeting(), Some("Pleased to meet you"));

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_server_classifies_as_connect_failed() {
    let path = unique_socket_path("absent");
    let _ = fs::remove_file(&path);

    let mut ctx = Context::new();
    let err = ctx.connect(&path).unwrap_err();

    assert!(matches!(
        err,
        ConnectError::ConnectFailed(ConnectFailure::Syscall(_))
    ));
    assert!(!ctx.is_connected());
}

#[test]
fn busy_context_refuses_second_connect() {
    let path = unique_socket_path("busy");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();
        // Keep the connection open while the second attempt is made.
        thread::sleep(Duration::from_millis(100));
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");

    let err = ctx.connect(&path).unwrap_err();
    assert!(matches!(err, ConnectError::AlreadyConnected));
    // The live connection is untouched.
    assert!(ctx.is_connected());

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn context_is_reusable_after_disconnect() {
    let path = unique_socket_path("reuse1");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK first\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("first connect");
    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);

    let path = unique_socket_path("reuse2");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK second\n").unwrap();
    });

    ctx.connect(&path).expect("second connect");
    assert_eq!(ctx.greeting(), Some("second"));

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn command_exchange_after_greeting() {
    let path = unique_socket_path("echo");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "PING\n");
        stream.write_all(b"PONG\n").unwrap();
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");

    ctx.write(b"PING\n").expect("write command");
    let mut buf = [0u8; 16];
    let n = ctx.read(&mut buf).expect("read reply");
    assert_eq!(&buf[..n], b"PONG\n");

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn descriptor_round_trip_from_server() {
    let path = unique_socket_path("fdtrip");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();

        let (read_end, write_end) = rustix::pipe::pipe().unwrap();
        rustix::io::write(&write_end, b"passed along").unwrap();
        send_fd_from_server(&stream, read_end.as_fd());
        // Hold the stream until the client has had a chance to receive.
        thread::sleep(Duration::from_millis(50));
    });

    let mut ctx = Context::new();
    ctx.connect_with(&path, None, TransportMode::DescriptorPassing)
        .expect("connect");

    let received = ctx.receive_descriptor().expect("receive descriptor");
    let mut buf = [0u8; 32];
    let n = rustix::io::read(&received, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"passed along");

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}

#[test]
fn caller_imposed_read_timeout_applies_to_socket() {
    let path = unique_socket_path("timeout");
    let server = serve_once(&path, |mut stream| {
        stream.write_all(b"OK\n").unwrap();
        // Send nothing further; hold the connection open past the timeout.
        thread::sleep(Duration::from_millis(200));
    });

    let mut ctx = Context::new();
    ctx.connect(&path).expect("connect");
    ctx.set_read_timeout(Some(Duration::from_millis(30)))
        .expect("set timeout");

    let mut buf = [0u8; 8];
    let err = ctx.read(&mut buf).unwrap_err();
    assert!(err == Errno::AGAIN || err == Errno::WOULDBLOCK);

    ctx.disconnect();
    server.join().unwrap();
    let _ = fs::remove_file(&path);
}
