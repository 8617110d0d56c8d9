//! `keybridge-config`: runtime configuration.
//!
//! Provides:
//! - Typed config read from environment variables
//! - Startup error taxonomy with per-cause exit codes
//! - Private key loading from the configured path

pub mod env;
pub mod error;

pub use env::{
    normalize_listen_address, GatewayConfig, IDLE_VAR, KEY_FILE_VAR, LISTEN_VAR, LOG_DIR_VAR,
    TIMEOUT_VAR, VIN_VAR,
};
pub use error::ConfigError;
