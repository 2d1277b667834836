//! Top-level facade crate for the Stark client.
//!
//! Re-exports the protocol types and the async client so users can depend on a single crate.

pub mod core {
    pub use stark_core::*;
}

pub mod client {
    pub use stark_client::*;
}

pub use stark_client::{ClientConfig, ClientEvent, StarkClient};
pub use stark_core::{DeviceId, Envelope, StarkError};
