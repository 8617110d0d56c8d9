use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DeviceError;
use crate::key::PrivateKey;
use crate::types::{DeviceId, Domain, VehicleAction};

/// An open short-range wireless link to one vehicle.
#[async_trait]
pub trait Transport: Send + Sync {
    fn device_id(&self) -> &DeviceId;

    /// Close the link. Closing twice is harmless.
    async fn close(&self);
}

/// Opens transports to vehicles by identifier.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, device_id: &DeviceId) -> Result<Arc<dyn Transport>, DeviceError>;
}

/// Protocol-level handle bound to one transport.
///
/// `connect` establishes the protocol channel; `start_session` runs the
/// authenticated handshake against the listed security domains.
#[async_trait]
pub trait Vehicle: Send + Sync {
    async fn connect(&self) -> Result<(), DeviceError>;

    async fn start_session(&self, domains: &[Domain]) -> Result<(), DeviceError>;

    async fn execute(&self, action: &VehicleAction) -> Result<(), DeviceError>;

    async fn disconnect(&self);
}

/// Builds protocol handles on top of an open transport.
pub trait VehicleFactory: Send + Sync {
    fn new_vehicle(
        &self,
        transport: Arc<dyn Transport>,
        key: Option<Arc<PrivateKey>>,
    ) -> Result<Arc<dyn Vehicle>, DeviceError>;
}
