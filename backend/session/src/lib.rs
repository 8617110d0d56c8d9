//! keybridge session layer: one connection to one vehicle, shared by every
//! request, woken on demand and dropped when idle.

pub mod deadline;
pub mod error;
pub mod manager;
pub mod provider;
pub mod wake;

pub use error::{SessionError, WakeError};
pub use manager::{SessionManager, SessionSettings};
pub use provider::{SessionHandle, SessionProvider};
pub use wake::{wake, WAKE_COMMAND};
