//! Session manager.
//!
//! Owns the one transport + authenticated vehicle session for the process.
//! All state sits behind a single async mutex: building a session, tearing it
//! down and handing it out never interleave. Concurrent callers queue on the
//! mutex while one of them connects, then take the fast path.
//!
//! Every arm of the idle timer bumps a generation counter. A timer that fires
//! after being superseded does nothing, and a timer never tears down a
//! session that requests still hold; the last `release` re-arms it instead.
//! Each handle carries a [`Lease`], so a request cancelled mid-command still
//! gives its claim back when its handle is dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use keybridge_commands::CommandRegistry;
use keybridge_core::{Connector, DeviceId, Domain, PrivateKey, Transport, Vehicle, VehicleFactory};
use keybridge_logging::{EventLogger, SessionEvent};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::deadline::within;
use crate::error::SessionError;
use crate::provider::{SessionHandle, SessionProvider};
use crate::wake::wake;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub device_id: DeviceId,
    /// Without a key the session is connected but never authenticated.
    pub key: Option<Arc<PrivateKey>>,
    pub timeout: Duration,
    pub idle_timeout: Duration,
}

struct Session {
    transport: Arc<dyn Transport>,
    vehicle: Arc<dyn Vehicle>,
    epoch: u64,
}

impl Session {
    async fn close(self) {
        self.vehicle.disconnect().await;
        self.transport.close().await;
    }
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    /// Handles out for the current session.
    in_flight: usize,
    timer_generation: u64,
    last_epoch: u64,
    idle_timer: Option<JoinHandle<()>>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    factory: Arc<dyn VehicleFactory>,
    registry: Arc<CommandRegistry>,
    settings: SessionSettings,
    state: Mutex<State>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        factory: Arc<dyn VehicleFactory>,
        registry: Arc<CommandRegistry>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                factory,
                registry,
                settings,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Return the live session, building it first if there is none.
    pub async fn acquire(&self) -> Result<SessionHandle, SessionError> {
        self.inner.acquire().await
    }

    /// End one request's use of the session and restart the idle countdown.
    pub async fn release(&self, handle: SessionHandle) {
        self.inner.release(handle).await
    }

    /// Tear the session down now.
    pub async fn invalidate(&self) {
        self.inner.invalidate().await
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.session.is_some()
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn acquire(&self) -> Result<SessionHandle, SessionError> {
        SessionManager::acquire(self).await
    }

    async fn release(&self, handle: SessionHandle) {
        SessionManager::release(self, handle).await
    }
}

impl Inner {
    fn device(&self) -> &str {
        self.settings.device_id.as_str()
    }

    async fn acquire(self: &Arc<Self>) -> Result<SessionHandle, SessionError> {
        let mut state = self.state.lock().await;

        let existing = state
            .session
            .as_ref()
            .map(|s| (Arc::clone(&s.vehicle), s.epoch));
        if let Some((vehicle, epoch)) = existing {
            let handle = SessionHandle::leased(vehicle, Lease::new(self, epoch));
            state.in_flight += 1;
            self.arm_idle_timer(&mut state);
            EventLogger::log_event(self.device(), SessionEvent::AcquireReused);
            return Ok(handle);
        }

        EventLogger::log_event(self.device(), SessionEvent::AcquireStart);
        state.last_epoch += 1;
        let session = self.establish(state.last_epoch).await?;
        let handle = SessionHandle::leased(
            Arc::clone(&session.vehicle),
            Lease::new(self, session.epoch),
        );

        state.session = Some(session);
        state.in_flight = 1;
        self.arm_idle_timer(&mut state);

        info!("Vehicle connected");
        EventLogger::log_event(
            self.device(),
            SessionEvent::AcquireSuccess {
                authenticated: self.settings.key.is_some(),
            },
        );
        Ok(handle)
    }

    /// Open, construct, connect and (with a key) authenticate. On failure
    /// everything created so far is closed before returning.
    async fn establish(&self, epoch: u64) -> Result<Session, SessionError> {
        let timeout = self.settings.timeout;
        let deadline = Instant::now() + timeout;

        info!("Creating connection...");
        let transport = within(deadline, timeout, self.connector.open(&self.settings.device_id))
            .await
            .map_err(|e| self.failed("open", SessionError::Connect(e)))?;

        let vehicle = match self
            .factory
            .new_vehicle(Arc::clone(&transport), self.settings.key.clone())
        {
            Ok(vehicle) => vehicle,
            Err(e) => {
                transport.close().await;
                return Err(self.failed("construct", SessionError::Connect(e)));
            }
        };
        let session = Session {
            transport,
            vehicle,
            epoch,
        };

        info!("Connecting to vehicle...");
        if let Err(e) = within(deadline, timeout, session.vehicle.connect()).await {
            session.close().await;
            return Err(self.failed("connect", SessionError::Connect(e)));
        }

        if self.settings.key.is_some() {
            if let Err(e) = self.handshake(&session, deadline).await {
                session.close().await;
                return Err(self.failed("handshake", e));
            }
        }

        Ok(session)
    }

    /// Full-domain handshake. A timeout means the car is asleep: wake it and
    /// try exactly once more with a fresh deadline.
    async fn handshake(&self, session: &Session, deadline: Instant) -> Result<(), SessionError> {
        let timeout = self.settings.timeout;

        info!("Starting session to vehicle...");
        let err = match within(deadline, timeout, session.vehicle.start_session(&Domain::ALL)).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_timeout() => err,
            Err(err) => return Err(SessionError::Handshake(err)),
        };
        debug!(error = %err, "handshake timed out, vehicle is probably asleep");

        EventLogger::log_event(self.device(), SessionEvent::WakeAttempt);
        let woke = wake(session.vehicle.as_ref(), &self.registry, timeout).await;
        EventLogger::log_event(
            self.device(),
            SessionEvent::WakeResult {
                ok: woke.is_ok(),
                error: woke.as_ref().err().map(ToString::to_string),
            },
        );
        woke?;

        let retry_deadline = Instant::now() + timeout;
        within(retry_deadline, timeout, session.vehicle.start_session(&Domain::ALL))
            .await
            .map_err(SessionError::HandshakeAfterWake)
    }

    fn failed(&self, stage: &str, err: SessionError) -> SessionError {
        EventLogger::log_event(
            self.device(),
            SessionEvent::AcquireFailure {
                stage: stage.to_string(),
                error: err.to_string(),
            },
        );
        err
    }

    async fn release(self: &Arc<Self>, mut handle: SessionHandle) {
        let Some(lease) = handle.lease.take() else {
            return;
        };
        let epoch = lease.disarm();
        let mut state = self.state.lock().await;
        self.release_epoch(&mut state, epoch);
    }

    /// Must be called with the state lock held.
    fn release_epoch(self: &Arc<Self>, state: &mut State, epoch: u64) {
        if state.session.as_ref().map(|s| s.epoch) != Some(epoch) {
            // Session was replaced or torn down since this handle was issued.
            return;
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.arm_idle_timer(state);
        }
    }

    async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;
        self.teardown(&mut state, "invalidated").await;
    }

    /// Must be called with the state lock held.
    fn arm_idle_timer(self: &Arc<Self>, state: &mut State) {
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;

        let generation = state.timer_generation;
        let idle = self.settings.idle_timeout;
        let inner: Weak<Inner> = Arc::downgrade(self);
        state.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(generation).await;
            }
        }));
    }

    async fn expire(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.timer_generation != generation {
            return;
        }
        // This task owns the handle; dropping it detaches rather than aborts.
        state.idle_timer = None;
        if state.in_flight > 0 {
            debug!(in_flight = state.in_flight, "idle timer fired while session in use");
            return;
        }
        self.teardown(&mut state, "idle timeout").await;
    }

    async fn teardown(&self, state: &mut State, reason: &str) {
        state.in_flight = 0;
        if let Some(session) = state.session.take() {
            info!("Disconnecting from vehicle...");
            session.close().await;
            EventLogger::log_event(
                self.device(),
                SessionEvent::Teardown {
                    reason: reason.to_string(),
                },
            );
        }
    }
}

/// One outstanding claim on a session. Dropping it without [`Lease::disarm`]
/// releases the claim from a spawned task.
pub(crate) struct Lease {
    inner: Option<Weak<Inner>>,
    epoch: u64,
}

impl Lease {
    fn new(inner: &Arc<Inner>, epoch: u64) -> Self {
        Self {
            inner: Some(Arc::downgrade(inner)),
            epoch,
        }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Give up the drop-time release; the caller releases explicitly.
    fn disarm(mut self) -> u64 {
        self.inner = None;
        self.epoch
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        // Without a runtime the process is shutting down; nothing to re-arm.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let epoch = self.epoch;
        debug!(epoch, "session handle dropped without release");
        runtime.spawn(async move {
            let mut state = inner.state.lock().await;
            inner.release_epoch(&mut state, epoch);
        });
    }
}
