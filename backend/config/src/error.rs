use keybridge_core::KeyError;
use thiserror::Error;

/// Fatal startup errors. Each maps to its own process exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TESLA_VIN environment variable not set")]
    MissingDeviceId,

    #[error("failed to load private key: {0}")]
    Key(#[from] KeyError),

    #[error("error listening on address {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ConfigError::Listen { .. } => 1,
            ConfigError::MissingDeviceId => 2,
            ConfigError::Key(_) => 3,
        }
    }
}
