//! Local-socket transport primitives.
//!
//! Provides endpoint validation and the blocking socket factory used to
//! reach a server on a filesystem-addressed local socket. Byte-level I/O on
//! the connected descriptor lives in [`crate::engine`].

pub mod endpoint;
pub mod socket;

pub use endpoint::{Endpoint, EndpointError};
