//! Device identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::generate_id;
use super::subscribe::SELF_ALIAS;

/// Opaque name of one client instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Use a caller supplied identity as-is.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<name>-<random id>`, e.g. `web-AB12CD34`.
    pub fn with_suffix(name: &str) -> Self {
        Self(format!("{name}-{}", generate_id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a subscription target: `"self"` becomes this identity.
    pub fn resolve<'a>(&'a self, device: &'a str) -> &'a str {
        if device == SELF_ALIAS {
            self.as_str()
        } else {
            device
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn self_alias_resolves_to_own_identity() {
        let dev = DeviceId::new("web-AB12CD34");
        assert_eq!(dev.resolve("self"), "web-AB12CD34");
        assert_eq!(dev.resolve("phone"), "phone");
    }

    #[test]
    fn suffix_keeps_the_name() {
        let dev = DeviceId::with_suffix("web");
        let (name, suffix) = dev.as_str().split_once('-').unwrap();
        assert_eq!(name, "web");
        assert_eq!(suffix.len(), 8);
    }
}
