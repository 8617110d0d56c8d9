//! Session Event Logger
//!
//! One structured event per session state transition, emitted on the
//! `session_events` tracing target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_vin;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    AcquireStart,
    AcquireReused,
    AcquireSuccess { authenticated: bool },
    AcquireFailure { stage: String, error: String },
    WakeAttempt,
    WakeResult { ok: bool, error: Option<String> },
    Teardown { reason: String },
}

impl SessionEvent {
    fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEvent::AcquireFailure { .. } | SessionEvent::WakeResult { ok: false, .. }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Logs a session transition, masking the device id and any id embedded
    /// in error text.
    pub fn log_event(device_id: &str, mut event: SessionEvent) {
        match &mut event {
            SessionEvent::AcquireFailure { error, .. } => {
                *error = redact_vin(error);
            }
            SessionEvent::WakeResult { error: Some(error), .. } => {
                *error = redact_vin(error);
            }
            _ => {}
        }

        let failure = event.is_failure();
        let entry = EventLogEntry {
            device: redact_vin(device_id),
            timestamp: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry).unwrap_or_else(|_| format!("{entry:?}"));

        if failure {
            warn!(target: "session_events", event = %json, "Session event");
        } else {
            info!(target: "session_events", event = %json, "Session event");
        }
    }
}
