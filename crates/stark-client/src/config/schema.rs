use std::time::Duration;

use serde::Deserialize;
use stark_core::error::{Result, StarkError};
use stark_core::DeviceId;

use crate::session::{DrainOrder, SessionOptions};

/// Path of the Stark stream on every host.
pub const STREAM_PATH: &str = "/stream/stark";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    pub client: ClientSection,
}

impl ClientConfig {
    /// Config for `host` with every other field at its default.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            version: 1,
            client: ClientSection {
                host: host.into(),
                ..ClientSection::default()
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(StarkError::UnsupportedVersion);
        }

        self.client.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    /// `host[:port]` of the Stark web endpoint.
    pub host: String,

    #[serde(default)]
    pub secure: bool,

    /// Fixed device identity. Generated from `device_name` when absent.
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub drain_order: DrainOrder,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            secure: false,
            device_id: None,
            device_name: default_device_name(),
            request_timeout_ms: default_request_timeout_ms(),
            drain_order: DrainOrder::default(),
        }
    }
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StarkError::BadRequest("client.host must not be empty".into()));
        }
        if self.host.contains("://") || self.host.contains('/') {
            return Err(StarkError::BadRequest(
                "client.host must be host[:port] without scheme or path".into(),
            ));
        }
        if matches!(self.device_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(StarkError::BadRequest("client.device_id must not be empty".into()));
        }
        if self.device_name.trim().is_empty() {
            return Err(StarkError::BadRequest("client.device_name must not be empty".into()));
        }
        if !(1000..=3_600_000).contains(&self.request_timeout_ms) {
            return Err(StarkError::BadRequest(
                "client.request_timeout_ms must be between 1000 and 3600000".into(),
            ));
        }
        Ok(())
    }

    /// `ws[s]://<host>/stream/stark`.
    pub fn stream_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}{STREAM_PATH}", self.host.trim())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            request_timeout: self.request_timeout(),
            drain_order: self.drain_order,
        }
    }

    pub fn device(&self) -> DeviceId {
        match &self.device_id {
            Some(id) => DeviceId::new(id.clone()),
            None => DeviceId::with_suffix(&self.device_name),
        }
    }
}

fn default_device_name() -> String {
    "web".into()
}
fn default_request_timeout_ms() -> u64 {
    300_000
}
