//! Stark envelope (JSON).
//!
//! One envelope per text frame. Empty string fields are omitted on the wire,
//! and the payload `p` is kept as an opaque `serde_json::Value`: the client
//! never interprets it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StarkError};
use crate::protocol::id::generate_id;

/// Protocol version stamped on outgoing envelopes.
pub const VERSION: &str = "0.5";

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

/// Stark envelope (Text frame).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version tag (field name is `stark` in JSON, `v` accepted).
    #[serde(rename = "stark", alias = "v", default, skip_serializing_if = "is_empty")]
    pub version: String,
    /// Message id, unique per sending client.
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    /// Operation / topic, e.g. `natural/handle`.
    #[serde(default, skip_serializing_if = "is_empty")]
    pub action: String,
    /// Sender device.
    #[serde(default, skip_serializing_if = "is_empty")]
    pub src: String,
    /// Target device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    /// Id of the envelope this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corr: Option<String>,
    /// Action specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Value>,
    /// Human readable rendering of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Envelope {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Attach a payload serialized from `payload`.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        let v = serde_json::to_value(payload)
            .map_err(|e| StarkError::BadRequest(format!("payload encode failed: {e}")))?;
        self.p = Some(v);
        Ok(self)
    }

    pub fn with_dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    pub fn with_corr(mut self, corr: impl Into<String>) -> Self {
        self.corr = Some(corr.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Assign an id if none is set and return it.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = generate_id();
        }
        &self.id
    }

    /// Apply the outgoing defaults: version, id, and `src = device`.
    pub fn fill_defaults(&mut self, device: &str) {
        if self.version.is_empty() {
            self.version = VERSION.to_string();
        }
        self.ensure_id();
        if self.src.is_empty() {
            self.src = device.to_string();
        }
    }

    /// Check the fields every sent envelope must carry.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(StarkError::InvalidEnvelope("missing version"));
        }
        if self.id.is_empty() {
            return Err(StarkError::InvalidEnvelope("missing id"));
        }
        if self.action.is_empty() {
            return Err(StarkError::InvalidEnvelope("missing action"));
        }
        if self.src.is_empty() {
            return Err(StarkError::InvalidEnvelope("missing source"));
        }
        Ok(())
    }

    /// Turn `reply` into a reply to `self`.
    ///
    /// `corr` defaults to this envelope's `corr` (keeping a conversation
    /// thread) or else its `id`; `dst` defaults to this envelope's `src`.
    pub fn reply(&self, mut reply: Envelope) -> Envelope {
        if reply.corr.is_none() {
            reply.corr = Some(self.corr.clone().unwrap_or_else(|| self.id.clone()));
        }
        if reply.dst.is_none() && !self.src.is_empty() {
            reply.dst = Some(self.src.clone());
        }
        reply
    }

    /// Path-prefix match on the action: `a` matches `a` and `a/b`, not `ab`.
    /// An empty prefix matches every action.
    pub fn is_action(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match self.action.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Decode the payload into `T`. A missing payload decodes from `null`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        let v = self.p.clone().unwrap_or(Value::Null);
        serde_json::from_value(v).map_err(|e| StarkError::Decode(format!("payload: {e}")))
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| StarkError::Internal(format!("envelope encode failed: {e}")))
    }

    pub fn decode(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| StarkError::Decode(format!("invalid envelope json: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_only_missing_fields() {
        let mut env = Envelope::new("x");
        env.fill_defaults("web-1");
        assert_eq!(env.version, VERSION);
        assert_eq!(env.id.len(), 8);
        assert_eq!(env.src, "web-1");
        assert!(env.validate().is_ok());

        let mut env = Envelope {
            version: "0.4".into(),
            id: "abc".into(),
            action: "x".into(),
            src: "other".into(),
            ..Envelope::default()
        };
        env.fill_defaults("web-1");
        assert_eq!(env.version, "0.4");
        assert_eq!(env.id, "abc");
        assert_eq!(env.src, "other");
    }

    #[test]
    fn validate_rejects_missing_action() {
        let mut env = Envelope::default();
        env.fill_defaults("web-1");
        let err = env.validate().unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_ENVELOPE");
    }

    #[test]
    fn empty_fields_are_omitted() {
        let env = Envelope::new("ack").with_dst("broker");
        let v: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(v, json!({"action": "ack", "dst": "broker"}));
    }

    #[test]
    fn reply_targets_sender_and_correlates() {
        let orig = Envelope {
            id: "q1".into(),
            action: "event/last".into(),
            src: "web-1".into(),
            ..Envelope::default()
        };
        let r = orig.reply(Envelope::new("event/found"));
        assert_eq!(r.corr.as_deref(), Some("q1"));
        assert_eq!(r.dst.as_deref(), Some("web-1"));

        let threaded = Envelope {
            corr: Some("root".into()),
            ..orig.clone()
        };
        assert_eq!(threaded.reply(Envelope::new("y")).corr.as_deref(), Some("root"));
    }

    #[test]
    fn action_prefix_matches_path_segments() {
        let env = Envelope::new("natural/handle");
        assert!(env.is_action(""));
        assert!(env.is_action("natural"));
        assert!(env.is_action("natural/handle"));
        assert!(!env.is_action("nat"));
        assert!(!env.is_action("natural/handle/more"));
    }

    #[test]
    fn version_accepts_short_alias() {
        let env = Envelope::decode(r#"{"v":"0.5","action":"x"}"#).unwrap();
        assert_eq!(env.version, "0.5");
    }

    #[test]
    fn typed_payload() {
        #[derive(Deserialize)]
        struct Loc {
            lat: f64,
        }
        let env = Envelope::new("location/update")
            .with_payload(&json!({"lat": 52.5}))
            .unwrap();
        let loc: Loc = env.decode_payload().unwrap();
        assert_eq!(loc.lat, 52.5);
    }
}
