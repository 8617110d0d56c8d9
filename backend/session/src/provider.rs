use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keybridge_core::Vehicle;

use crate::error::SessionError;
use crate::manager::Lease;

/// A request's claim on the live session. Hand it back with
/// [`SessionProvider::release`] once the command has run; a handle that is
/// dropped instead (a cancelled request) gives its claim back on drop.
pub struct SessionHandle {
    vehicle: Arc<dyn Vehicle>,
    pub(crate) lease: Option<Lease>,
}

impl SessionHandle {
    /// A handle not tied to any managed session.
    pub fn new(vehicle: Arc<dyn Vehicle>) -> Self {
        Self {
            vehicle,
            lease: None,
        }
    }

    pub(crate) fn leased(vehicle: Arc<dyn Vehicle>, lease: Lease) -> Self {
        Self {
            vehicle,
            lease: Some(lease),
        }
    }

    pub fn vehicle(&self) -> &dyn Vehicle {
        self.vehicle.as_ref()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("epoch", &self.lease.as_ref().map(Lease::epoch))
            .finish()
    }
}

/// What the request dispatcher needs from the session layer.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self) -> Result<SessionHandle, SessionError>;

    async fn release(&self, handle: SessionHandle);
}
