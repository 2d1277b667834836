//! Stark protocol primitives.
//!
//! - `envelope`: the JSON unit exchanged over the channel, with defaulting,
//!   validation, and reply helpers.
//! - `id`: short random message ids.
//! - `device`: opaque device identity and the `self` alias.
//! - `subscribe`: `proto/sub` payloads and reserved action names.
//!
//! Decoding never panics: malformed input is reported as `StarkError::Decode`.

pub mod device;
pub mod envelope;
pub mod id;
pub mod subscribe;

pub use device::DeviceId;
pub use envelope::{Envelope, VERSION};
pub use id::generate_id;
pub use subscribe::{SubscribePayload, ACK_ACTION, PING_ACTION, SELF_ALIAS, SUBSCRIBE_ACTION};
