//! Client-side bootstrap for line-oriented local socket IPC.
//!
//! `tether` establishes a connection to a server listening on a
//! filesystem-addressed local socket, installs a pluggable I/O engine, and
//! performs the protocol's one-line greeting handshake before handing a ready
//! [`Context`] to the caller. Everything after the greeting (the command
//! loop itself) belongs to the layer above; this crate guarantees only that
//! a returned context is either fully connected or fully torn down.
//!
//! ```no_run
//! use tether::Context;
//!
//! let mut ctx = Context::new();
//! ctx.connect("/run/agent.sock")?;
//! println!("server says: {}", ctx.greeting().unwrap_or("(no banner)"));
//! # Ok::<(), tether::ConnectError>(())
//! ```

pub mod engine;
pub mod net;
pub mod session;

mod trace;

pub use engine::{DescriptorChannel, Engine};
pub use net::{Endpoint, EndpointError};
pub use session::context::Context;
pub use session::handshake::{Greeting, GreetingError};
pub use session::types::{ConnectError, ConnectFailure, ServerHint, TransportMode};
pub use trace::init_tracing;
