//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use stark_core::error::{Result, StarkError};

pub use schema::{ClientConfig, ClientSection, STREAM_PATH};
pub use crate::session::DrainOrder;

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| StarkError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig = serde_yaml::from_str(s)
        .map_err(|e| StarkError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
