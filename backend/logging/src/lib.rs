//! Structured logging for keybridge.
//!
//! Handles subscriber setup, VIN redaction and the session event log.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, SessionEvent};
pub use logger::init_logger;
pub use redact::redact_vin;
