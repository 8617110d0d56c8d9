use keybridge_commands::CommandError;
use keybridge_core::DeviceError;
use thiserror::Error;

/// Why a session could not be made ready.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to vehicle: {0}")]
    Connect(DeviceError),

    #[error("failed to perform handshake with vehicle: {0}")]
    Handshake(DeviceError),

    #[error("failed to wake up vehicle: {0}")]
    Wake(#[from] WakeError),

    #[error("failed to perform handshake with vehicle after wake up: {0}")]
    HandshakeAfterWake(DeviceError),
}

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("vehicle security handshake failed: {0}")]
    Handshake(DeviceError),

    #[error("wake command failed: {0}")]
    Command(CommandError),

    #[error("no wake command registered")]
    Unavailable,
}
