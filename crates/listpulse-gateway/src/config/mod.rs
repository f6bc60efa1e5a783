//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use listpulse_core::error::{PulseError, Result};

pub use schema::{
    BroadcastSection, DatabaseSection, PollerSection, PulseConfig, QosMode, ServerSection,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LISTPULSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "listpulse.yaml";

pub fn load_from_file(path: &str) -> Result<PulseConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PulseError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<PulseConfig> {
    let cfg: PulseConfig = serde_yaml::from_str(s)
        .map_err(|e| PulseError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config path from the environment, falling back to the default.
pub fn config_path() -> String {
    std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
