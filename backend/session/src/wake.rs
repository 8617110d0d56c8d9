//! Wake coordinator.
//!
//! A sleeping vehicle ignores infotainment handshakes but still answers its
//! vehicle-security controller. Waking it takes a restricted session with
//! that domain alone, followed by the registry's `wake` command.

use std::time::Duration;

use keybridge_commands::{CommandArgs, CommandRegistry};
use keybridge_core::{Domain, Vehicle};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::deadline::within;
use crate::error::WakeError;

pub const WAKE_COMMAND: &str = "wake";

/// Rouse the vehicle. Both steps share one deadline of `timeout`.
///
/// Partial state is left to the caller to tear down.
pub async fn wake(
    vehicle: &dyn Vehicle,
    registry: &CommandRegistry,
    timeout: Duration,
) -> Result<(), WakeError> {
    let deadline = Instant::now() + timeout;
    let command = registry.lookup(WAKE_COMMAND).ok_or(WakeError::Unavailable)?;

    info!("Waking up vehicle");
    within(deadline, timeout, vehicle.start_session(&[Domain::VehicleSecurity]))
        .await
        .map_err(WakeError::Handshake)?;
    debug!("vehicle security session established");

    within(deadline, timeout, command.handler.execute(vehicle, &CommandArgs::new()))
        .await
        .map_err(WakeError::Command)?;
    info!("Woke up vehicle");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keybridge_core::{DeviceError, VehicleAction};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedVehicle {
        vcsec_fails: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Vehicle for ScriptedVehicle {
        async fn connect(&self) -> Result<(), DeviceError> {
            Ok(())
        }
        async fn start_session(&self, domains: &[Domain]) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(format!("session {domains:?}"));
            if self.vcsec_fails {
                return Err(DeviceError::Handshake("unknown key".into()));
            }
            Ok(())
        }
        async fn execute(&self, action: &VehicleAction) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(format!("execute {action:?}"));
            Ok(())
        }
        async fn disconnect(&self) {}
    }

    #[tokio::test]
    async fn restricted_session_then_wake_command() {
        let vehicle = ScriptedVehicle::default();
        wake(&vehicle, &CommandRegistry::new(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            *vehicle.calls.lock().unwrap(),
            vec!["session [VehicleSecurity]".to_string(), "execute Wake".to_string()]
        );
    }

    #[tokio::test]
    async fn handshake_failure_skips_command() {
        let vehicle = ScriptedVehicle {
            vcsec_fails: true,
            ..Default::default()
        };
        let err = wake(&vehicle, &CommandRegistry::new(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, WakeError::Handshake(_)));
        assert_eq!(vehicle.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_wake_command_is_reported() {
        let vehicle = ScriptedVehicle::default();
        let err = wake(&vehicle, &CommandRegistry::empty(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, WakeError::Unavailable));
        assert!(vehicle.calls.lock().unwrap().is_empty());
    }
}
