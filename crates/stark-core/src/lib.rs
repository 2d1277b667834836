//! Stark core: transport-agnostic protocol primitives and the shared error type.
//!
//! This crate defines the envelope wire contract, id generation, device
//! identity, and subscription payloads used by the client runtime. It carries
//! no transport or async runtime dependencies so it can be reused by brokers,
//! tools, and tests alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `StarkError`/`Result` so a malformed frame
//! from the network never takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, StarkError};
pub use protocol::{DeviceId, Envelope};
