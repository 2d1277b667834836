//! Subscription payloads and reserved actions.

use serde::{Deserialize, Serialize};

/// Action of a subscription request.
pub const SUBSCRIBE_ACTION: &str = "proto/sub";
/// Keep-alive probe sent by the broker.
pub const PING_ACTION: &str = "ping";
/// Keep-alive answer.
pub const ACK_ACTION: &str = "ack";
/// Alias for the client's own device identity.
pub const SELF_ALIAS: &str = "self";

/// Payload `p` of a `proto/sub` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    /// Action (topic prefix) of interest; empty means every action.
    pub action: String,
    /// Restrict to envelopes directed at this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl SubscribePayload {
    pub fn new(action: impl Into<String>, device: Option<String>) -> Self {
        Self {
            action: action.into(),
            device,
        }
    }
}
