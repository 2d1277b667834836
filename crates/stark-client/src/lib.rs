//! Stark protocol client.
//!
//! This crate wires the sans-IO protocol session, the WebSocket transport
//! worker, config loading, and metrics into an async client handle. It is
//! consumed by the `starkcat` binary and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod client;
pub mod config;
pub mod obs;
pub mod session;
pub mod transport;

pub use client::{ClientEvent, Events, PendingReply, StarkClient};
pub use config::ClientConfig;
