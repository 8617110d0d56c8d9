use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the transport and device-session collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The operation did not complete before its deadline. A sleeping vehicle
    /// answers nothing but vehicle-security traffic, so handshakes stall here.
    #[error("context deadline exceeded after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error("vehicle rejected command: {0}")]
    Rejected(String),

    #[error("vehicle is not connected")]
    NotConnected,
}

impl DeviceError {
    /// True when the failure was a deadline expiry rather than an explicit
    /// rejection.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Timeout(_))
    }
}

/// Errors raised while loading the private key used for authenticated
/// sessions.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid private key in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
