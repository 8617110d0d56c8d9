//! In-process vehicle used when no radio backend is linked.
//!
//! The simulated car sleeps until it receives [`VehicleAction::Wake`].
//! While asleep only the vehicle-security domain answers; infotainment
//! handshakes and commands stall and then fail with a timeout, the same way a
//! real sleeping car behaves.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DeviceError;
use crate::key::PrivateKey;
use crate::traits::{Connector, Transport, Vehicle, VehicleFactory};
use crate::types::{DeviceId, Domain, VehicleAction};

const DEFAULT_STALL: Duration = Duration::from_millis(500);

/// State that outlives individual connections: sleep state and the log of
/// executed actions.
pub struct SimulatedCar {
    asleep: AtomicBool,
    opens: AtomicUsize,
    executed: Mutex<Vec<VehicleAction>>,
    stall: Duration,
}

impl SimulatedCar {
    pub fn new() -> Arc<Self> {
        Self::with_stall(DEFAULT_STALL)
    }

    /// How long a sleeping car leaves infotainment traffic unanswered.
    pub fn with_stall(stall: Duration) -> Arc<Self> {
        Arc::new(Self {
            asleep: AtomicBool::new(true),
            opens: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            stall,
        })
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep.load(Ordering::SeqCst)
    }

    pub fn set_asleep(&self, asleep: bool) {
        self.asleep.store(asleep, Ordering::SeqCst);
    }

    /// Number of transports opened so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<VehicleAction> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record(&self, action: &VehicleAction) {
        if let Ok(mut log) = self.executed.lock() {
            log.push(action.clone());
        }
    }

    async fn stall(&self) -> DeviceError {
        tokio::time::sleep(self.stall).await;
        DeviceError::Timeout(self.stall)
    }
}

pub struct SimulatedTransport {
    device_id: DeviceId,
    closed: AtomicBool,
}

impl SimulatedTransport {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("simulated transport closed");
        }
    }
}

pub struct SimulatedConnector {
    car: Arc<SimulatedCar>,
}

impl SimulatedConnector {
    pub fn new(car: Arc<SimulatedCar>) -> Self {
        Self { car }
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn open(&self, device_id: &DeviceId) -> Result<Arc<dyn Transport>, DeviceError> {
        self.car.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimulatedTransport {
            device_id: device_id.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct SimulatedVehicleFactory {
    car: Arc<SimulatedCar>,
}

impl SimulatedVehicleFactory {
    pub fn new(car: Arc<SimulatedCar>) -> Self {
        Self { car }
    }
}

impl VehicleFactory for SimulatedVehicleFactory {
    fn new_vehicle(
        &self,
        transport: Arc<dyn Transport>,
        key: Option<Arc<PrivateKey>>,
    ) -> Result<Arc<dyn Vehicle>, DeviceError> {
        Ok(Arc::new(SimulatedVehicle {
            car: Arc::clone(&self.car),
            _transport: transport,
            has_key: key.is_some(),
            connected: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        }))
    }
}

struct SimulatedVehicle {
    car: Arc<SimulatedCar>,
    _transport: Arc<dyn Transport>,
    has_key: bool,
    connected: AtomicBool,
    sessions: Mutex<Vec<Domain>>,
}

impl SimulatedVehicle {
    fn has_session(&self, domain: Domain) -> bool {
        self.sessions
            .lock()
            .map(|s| s.contains(&domain))
            .unwrap_or(false)
    }
}

/// Actions the car accepts without an authenticated session.
fn is_unauthenticated(action: &VehicleAction) -> bool {
    matches!(
        action,
        VehicleAction::Wake
            | VehicleAction::BodyControllerState
            | VehicleAction::SessionInfo { .. }
            | VehicleAction::AddKeyRequest { .. }
    )
}

#[async_trait]
impl Vehicle for SimulatedVehicle {
    async fn connect(&self) -> Result<(), DeviceError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_session(&self, domains: &[Domain]) -> Result<(), DeviceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }
        if !self.has_key {
            return Err(DeviceError::Handshake("no private key loaded".into()));
        }
        for domain in domains {
            if *domain == Domain::Infotainment && self.car.is_asleep() {
                return Err(self.car.stall().await);
            }
            if let Ok(mut sessions) = self.sessions.lock() {
                if !sessions.contains(domain) {
                    sessions.push(*domain);
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, action: &VehicleAction) -> Result<(), DeviceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::NotConnected);
        }
        let domain = action.domain();
        if !is_unauthenticated(action) && !self.has_session(domain) {
            return Err(DeviceError::Rejected(format!("no session with {domain}")));
        }
        if domain == Domain::Infotainment && self.car.is_asleep() {
            return Err(self.car.stall().await);
        }
        if *action == VehicleAction::Wake {
            self.car.set_asleep(false);
        }
        self.car.record(action);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
    }
}
