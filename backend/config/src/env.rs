//! Environment-variable configuration.
//!
//! Values are read once at startup. `from_env_map` takes an explicit map so
//! tests don't have to mutate the process environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use keybridge_core::{load_private_key, DeviceId, PrivateKey};

use crate::error::ConfigError;

pub const VIN_VAR: &str = "TESLA_VIN";
pub const KEY_FILE_VAR: &str = "TESLA_KEY_FILE";
pub const TIMEOUT_VAR: &str = "TESLA_SESSION_SECS";
pub const LISTEN_VAR: &str = "LISTEN_ADDRESS";
pub const IDLE_VAR: &str = "KEYBRIDGE_IDLE_SECS";
pub const LOG_DIR_VAR: &str = "KEYBRIDGE_LOG_DIR";
pub const LOG_LEVEL_VAR: &str = "RUST_LOG";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_SECS: u64 = 10;
pub const DEFAULT_LISTEN: &str = ":3333";

/// keybridge runtime configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// VIN of the vehicle to control
    pub device_id: DeviceId,
    /// PEM private key; without it only unauthenticated commands are served
    pub key_file: Option<PathBuf>,
    /// Deadline for each connect, handshake, wake and command
    pub timeout: Duration,
    /// How long an unused session stays open
    pub idle_timeout: Duration,
    /// HTTP listen address, `host:port` or `:port`
    pub listen_address: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// Non-fatal problems found while parsing, logged once logging is up.
    pub warnings: Vec<String>,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(&std::env::vars().collect())
    }

    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();

        let device_id = get(VIN_VAR)
            .map(DeviceId::new)
            .ok_or(ConfigError::MissingDeviceId)?;

        let timeout = seconds(get(TIMEOUT_VAR), TIMEOUT_VAR, DEFAULT_TIMEOUT_SECS, &mut warnings);
        let idle_timeout = seconds(get(IDLE_VAR), IDLE_VAR, DEFAULT_IDLE_SECS, &mut warnings);

        Ok(Self {
            device_id,
            key_file: get(KEY_FILE_VAR).map(PathBuf::from),
            timeout,
            idle_timeout,
            listen_address: normalize_listen_address(get(LISTEN_VAR).unwrap_or(DEFAULT_LISTEN)),
            log_level: get(LOG_LEVEL_VAR).unwrap_or("info").to_string(),
            log_dir: get(LOG_DIR_VAR).map(PathBuf::from),
            warnings,
        })
    }

    /// Load the configured private key, if any.
    pub fn load_key(&self) -> Result<Option<PrivateKey>, ConfigError> {
        match &self.key_file {
            Some(path) => Ok(Some(load_private_key(path)?)),
            None => Ok(None),
        }
    }
}

fn seconds(raw: Option<&str>, name: &str, default: u64, warnings: &mut Vec<String>) -> Duration {
    let secs = match raw {
        None => default,
        Some(value) => match value.parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                warnings.push(format!(
                    "{name}={value:?} is not a positive number of seconds, using {default}"
                ));
                default
            }
        },
    };
    Duration::from_secs(secs)
}

/// `:3333` binds every interface.
pub fn normalize_listen_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}
