//! Session establishment for the line-oriented local protocol.
//!
//! A [`Context`](context::Context) is created empty by the caller, connected
//! through the orchestration in [`context`], greeted through [`handshake`],
//! and then handed to the higher-level command loop. Shared session types
//! (transport modes, hints, the error taxonomy) live in [`types`].

pub mod context;
pub mod handshake;
pub mod types;
