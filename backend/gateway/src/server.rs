//! HTTP server.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::Uri,
    routing::get,
    Router,
};
use keybridge_commands::CommandRegistry;
use keybridge_config::ConfigError;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::dispatcher::{Dispatcher, Outcome};

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(handle_request).post(handle_request))
        .route("/favicon.ico", get(favicon))
        .route("/:command", get(handle_request).post(handle_request))
        .fallback(handle_request)
        .with_state(GatewayState { dispatcher })
}

/// Bind the listen address. Failure is fatal with its own exit code.
pub async fn bind(addr: &str) -> Result<TcpListener, ConfigError> {
    TcpListener::bind(addr).await.map_err(|source| ConfigError::Listen {
        addr: addr.to_string(),
        source,
    })
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
#[instrument(skip_all)]
pub async fn start_server(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(dispatcher);

    info!("listening on address {}", listener.local_addr()?);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn favicon(
    remote: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
) -> Outcome {
    log_request(remote, &uri, &Outcome::NotFound, None);
    Outcome::NotFound
}

async fn handle_request(
    State(state): State<GatewayState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Outcome {
    let query = first_values(pairs);
    let outcome = state.dispatcher.handle(uri.path(), &query).await;

    let help = resolved_help(state.dispatcher.registry(), uri.path());
    log_request(remote, &uri, &outcome, help);
    outcome
}

/// Help line of the command a path names, for the request log.
fn resolved_help<'a>(registry: &'a CommandRegistry, path: &str) -> Option<&'a str> {
    registry
        .lookup(path.trim_start_matches('/'))
        .map(|command| command.help.as_str())
}

/// A repeated query parameter binds to its first value.
fn first_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut query = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        query.entry(name).or_insert(value);
    }
    query
}

fn log_request(
    remote: Option<ConnectInfo<SocketAddr>>,
    uri: &Uri,
    outcome: &Outcome,
    help: Option<&str>,
) {
    let remote = remote.map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string());
    info!(
        help = help.unwrap_or_default(),
        "Request uri from {}: {} - Response code: {}",
        remote,
        uri,
        outcome.status().as_u16()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{BAD_REQUEST_FIELD, ERROR_HEADER};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use keybridge_core::{DeviceError, Domain, Vehicle, VehicleAction};
    use keybridge_session::{SessionError, SessionHandle, SessionProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    struct ReadyVehicle;

    #[async_trait]
    impl Vehicle for ReadyVehicle {
        async fn connect(&self) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn start_session(&self, _domains: &[Domain]) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn execute(&self, _action: &VehicleAction) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn disconnect(&self) {}
    }

    #[derive(Default)]
    struct CountingSessions {
        acquires: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for CountingSessions {
        async fn acquire(&self) -> Result<SessionHandle, SessionError> {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(SessionHandle::new(Arc::new(ReadyVehicle)))
        }
        async fn release(&self, _handle: SessionHandle) {}
    }

    fn app(key_loaded: bool) -> (Router, Arc<CountingSessions>) {
        let sessions = Arc::new(CountingSessions::default());
        let dispatcher = Dispatcher::new(
            Arc::new(CommandRegistry::new()),
            sessions.clone(),
            key_loaded,
            Duration::from_secs(5),
        );
        (router(Arc::new(dispatcher)), sessions)
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_root_without_key_lists_with_warning() {
        let (app, _) = app(false);
        let (status, _, body) = send(app, Method::GET, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("WARNING: No private key set"));
        assert!(!body.contains("Name: unlock\n"));
        assert!(!body.contains("Name: climate-on\n"));
    }

    #[tokio::test]
    async fn test_favicon_and_unknown_are_empty_404() {
        for uri in ["/favicon.ico", "/unknowncmd", "/wake/extra"] {
            let (app, sessions) = app(true);
            let (status, _, body) = send(app, Method::GET, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body.is_empty());
            assert_eq!(sessions.acquires.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_wake_with_ready_session_is_ok() {
        let (app, sessions) = app(false);
        let (status, headers, body) = send(app, Method::GET, "/wake").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert!(headers.get(ERROR_HEADER).is_none());
        assert_eq!(sessions.acquires.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_is_accepted() {
        let (app, _) = app(true);
        let (status, _, _) = send(app, Method::POST, "/charging-set-limit?percent=80").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bad_request_sets_header() {
        let (app, sessions) = app(true);
        let (status, headers, _) = send(app, Method::GET, "/get?endpoint=vehicle_data").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            headers.get(BAD_REQUEST_FIELD).unwrap(),
            "Method get is only supported via Fleet API"
        );
        assert_eq!(sessions.acquires.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_parameter_binds_first_value() {
        let (app, sessions) = app(true);
        let (status, headers, _) =
            send(app, Method::GET, "/charging-set-limit?percent=60&percent=130").await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(ERROR_HEADER).is_none());
        assert_eq!(sessions.acquires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_log_resolves_help_line() {
        let registry = CommandRegistry::new();
        let wake = registry.lookup("wake").unwrap();
        assert_eq!(resolved_help(&registry, "/wake"), Some(wake.help.as_str()));
        assert_eq!(resolved_help(&registry, "/unknowncmd"), None);
        assert_eq!(resolved_help(&registry, "/"), None);
    }

    #[test]
    fn test_first_values_keeps_earliest() {
        let query = first_values(vec![
            ("percent".to_string(), "60".to_string()),
            ("help".to_string(), String::new()),
            ("percent".to_string(), "90".to_string()),
        ]);
        assert_eq!(query.len(), 2);
        assert_eq!(query["percent"], "60");
    }

    #[tokio::test]
    async fn test_help_query_without_value() {
        let (app, sessions) = app(true);
        let (status, _, body) = send(app, Method::GET, "/sentry-mode?help").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Argument name: state - Description: "));
        assert_eq!(sessions.acquires.load(Ordering::SeqCst), 0);
    }
}
