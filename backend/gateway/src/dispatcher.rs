//! Request dispatcher.
//!
//! Turns `/<command>?<args>` into a registry lookup, the auth and argument
//! checks, one session acquisition and one handler call. Every request that
//! fails a check is answered without touching the session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use keybridge_commands::{CommandError, CommandRegistry};
use keybridge_core::DeviceError;
use keybridge_session::SessionProvider;
use tracing::{debug, warn};

use crate::listing::{render_help, render_listing};

pub const BAD_REQUEST_FIELD: &str = "x-bad-request-field";
pub const ERROR_HEADER: &str = "x-error";

const FAVICON: &str = "favicon.ico";
const HELP_PARAM: &str = "help";

/// Result of one dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok(String),
    NotFound,
    /// Detail goes out in `x-bad-request-field`.
    BadRequest(String),
    /// Detail goes out in `x-error`.
    InternalError(String),
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Ok(_) => StatusCode::OK,
            Outcome::NotFound => StatusCode::NOT_FOUND,
            Outcome::BadRequest(_) => StatusCode::BAD_REQUEST,
            Outcome::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Outcome::Ok(body) => (status, body).into_response(),
            Outcome::NotFound => status.into_response(),
            Outcome::BadRequest(field) => {
                (status, [(BAD_REQUEST_FIELD, header_value(&field))]).into_response()
            }
            Outcome::InternalError(error) => {
                (status, [(ERROR_HEADER, header_value(&error))]).into_response()
            }
        }
    }
}

/// Header values must be visible ASCII; anything else becomes `?`.
fn header_value(text: &str) -> HeaderValue {
    let cleaned: String = text
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect();
    HeaderValue::from_str(&cleaned).unwrap_or_else(|_| HeaderValue::from_static("?"))
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    sessions: Arc<dyn SessionProvider>,
    key_loaded: bool,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        sessions: Arc<dyn SessionProvider>,
        key_loaded: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sessions,
            key_loaded,
            timeout,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn key_loaded(&self) -> bool {
        self.key_loaded
    }

    /// Dispatch a request. `path` is the URL path, with or without the
    /// leading slash.
    pub async fn handle(&self, path: &str, query: &HashMap<String, String>) -> Outcome {
        let name = path.strip_prefix('/').unwrap_or(path);
        if name.is_empty() {
            return Outcome::Ok(render_listing(&self.registry, self.key_loaded));
        }
        if name == FAVICON {
            return Outcome::NotFound;
        }

        let Some(command) = self.registry.lookup(name) else {
            return Outcome::NotFound;
        };
        if command.requires_fleet_api {
            return Outcome::BadRequest(CommandError::FleetApiOnly(command.name.clone()).to_string());
        }
        if command.requires_auth && !self.key_loaded {
            return Outcome::BadRequest(CommandError::AuthRequired(command.name.clone()).to_string());
        }

        debug!(command = %command.name, help = %command.help, query = ?query, "resolved command");

        if query.contains_key(HELP_PARAM) {
            return Outcome::Ok(render_help(command));
        }

        let args = match command.bind_args(query) {
            Ok(args) => args,
            Err(e) => return Outcome::BadRequest(e.to_string()),
        };

        let handle = match self.sessions.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(command = %command.name, error = %e, "Error connecting to car");
                return Outcome::InternalError(format!("Error connecting to car: {e}"));
            }
        };

        let result = tokio::time::timeout(self.timeout, command.handler.execute(handle.vehicle(), &args))
            .await
            .unwrap_or_else(|_| Err(CommandError::Device(DeviceError::Timeout(self.timeout))));
        self.sessions.release(handle).await;

        match result {
            Ok(()) => Outcome::Ok(String::new()),
            Err(e) => {
                warn!(command = %command.name, error = %e, "command failed");
                Outcome::InternalError(format!("Error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keybridge_core::{Domain, Vehicle, VehicleAction};
    use keybridge_session::{SessionError, SessionHandle};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingVehicle {
        executed: Mutex<Vec<VehicleAction>>,
        reject: bool,
        hang: bool,
    }

    #[async_trait]
    impl Vehicle for RecordingVehicle {
        async fn connect(&self) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn start_session(&self, _domains: &[Domain]) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn execute(&self, action: &VehicleAction) -> Result<(), DeviceError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.reject {
                return Err(DeviceError::Rejected("vehicle is moving".into()));
            }
            self.executed.lock().unwrap().push(action.clone());
            Ok(())
        }
        async fn disconnect(&self) {}
    }

    struct MockSessions {
        vehicle: Arc<RecordingVehicle>,
        fail: bool,
        acquires: AtomicUsize,
        releases: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for MockSessions {
        async fn acquire(&self) -> Result<SessionHandle, SessionError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SessionError::Connect(DeviceError::Transport("out of range".into())));
            }
            Ok(SessionHandle::new(self.vehicle.clone()))
        }
        async fn release(&self, _handle: SessionHandle) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sessions(vehicle: RecordingVehicle, fail: bool) -> Arc<MockSessions> {
        Arc::new(MockSessions {
            vehicle: Arc::new(vehicle),
            fail,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    fn dispatcher(sessions: &Arc<MockSessions>, key_loaded: bool) -> Dispatcher {
        Dispatcher::new(
            Arc::new(CommandRegistry::new()),
            sessions.clone(),
            key_loaded,
            Duration::from_secs(5),
        )
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_fleet_command_never_acquires() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, true).handle("/product-info", &query(&[])).await;

        assert_eq!(
            outcome,
            Outcome::BadRequest("Method product-info is only supported via Fleet API".into())
        );
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_command_needs_key() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, false).handle("/lock", &query(&[])).await;
        assert_eq!(
            outcome,
            Outcome::BadRequest("Method lock is only supported via Authentication".into())
        );
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 0);

        let outcome = dispatcher(&mock, true).handle("/lock", &query(&[])).await;
        assert_eq!(outcome, Outcome::Ok(String::new()));
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(*mock.vehicle.executed.lock().unwrap(), vec![VehicleAction::Lock]);
    }

    #[tokio::test]
    async fn test_help_does_not_acquire() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, true)
            .handle("/charging-set-limit", &query(&[("help", "")]))
            .await;

        let Outcome::Ok(body) = outcome else {
            panic!("expected help text");
        };
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("Argument name: percent - Description: "));
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_names_first_missing() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, false)
            .handle("/session-info", &query(&[("domain", "vcsec")]))
            .await;

        assert_eq!(
            outcome,
            Outcome::BadRequest(
                "Missing public_key parameter. use help query string for a complete list of arguments"
                    .into()
            )
        );
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_favicon_are_not_found() {
        let mock = sessions(RecordingVehicle::default(), false);
        let dispatcher = dispatcher(&mock, true);
        assert_eq!(dispatcher.handle("/unknowncmd", &query(&[])).await, Outcome::NotFound);
        assert_eq!(dispatcher.handle("/favicon.ico", &query(&[])).await, Outcome::NotFound);
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wake_runs_and_releases() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, false).handle("/wake", &query(&[])).await;

        assert_eq!(outcome, Outcome::Ok(String::new()));
        assert_eq!(mock.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(mock.releases.load(Ordering::SeqCst), 1);
        assert_eq!(*mock.vehicle.executed.lock().unwrap(), vec![VehicleAction::Wake]);
    }

    #[tokio::test]
    async fn test_acquire_failure_is_internal_error() {
        let mock = sessions(RecordingVehicle::default(), true);
        let outcome = dispatcher(&mock, false).handle("/wake", &query(&[])).await;

        let Outcome::InternalError(error) = outcome else {
            panic!("expected internal error");
        };
        assert!(error.starts_with("Error connecting to car: "));
        assert!(error.contains("out of range"));
        assert_eq!(mock.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_still_releases() {
        let vehicle = RecordingVehicle {
            reject: true,
            ..Default::default()
        };
        let mock = sessions(vehicle, false);
        let outcome = dispatcher(&mock, true).handle("/honk", &query(&[])).await;

        assert_eq!(
            outcome,
            Outcome::InternalError("Error: vehicle rejected command: vehicle is moving".into())
        );
        assert_eq!(mock.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bad_argument_value_is_internal_error() {
        let mock = sessions(RecordingVehicle::default(), false);
        let outcome = dispatcher(&mock, true)
            .handle("/charging-set-limit", &query(&[("percent", "lots")]))
            .await;

        let Outcome::InternalError(error) = outcome else {
            panic!("expected internal error");
        };
        assert!(error.contains("percent"));
        assert!(mock.vehicle.executed.lock().unwrap().is_empty());
        assert_eq!(mock.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_is_bounded_by_timeout() {
        let vehicle = RecordingVehicle {
            hang: true,
            ..Default::default()
        };
        let mock = sessions(vehicle, false);
        let outcome = dispatcher(&mock, true).handle("/flash-lights", &query(&[])).await;

        let Outcome::InternalError(error) = outcome else {
            panic!("expected internal error");
        };
        assert!(error.contains("context deadline exceeded"));
        assert_eq!(mock.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_header_value_masks_control_characters() {
        assert_eq!(header_value("bad\nvalue °C"), HeaderValue::from_static("bad?value ?C"));
    }
}
