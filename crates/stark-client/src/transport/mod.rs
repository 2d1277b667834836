//! Transport layer (WebSocket).
//!
//! `codec` classifies raw WebSocket messages once; `ws` is the worker task that
//! owns the socket and the protocol `Session`.

pub mod codec;
pub(crate) mod ws;
