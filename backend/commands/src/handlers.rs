/// Command handlers.
///
/// Built-in commands all go through [`ActionHandler`]: parse the bound
/// arguments into a [`VehicleAction`], then hand it to the vehicle.
use async_trait::async_trait;
use keybridge_core::{Vehicle, VehicleAction};
use tracing::debug;

use crate::types::{CommandArgs, CommandError};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, vehicle: &dyn Vehicle, args: &CommandArgs) -> Result<(), CommandError>;
}

pub type ActionBuilder = fn(&CommandArgs) -> Result<VehicleAction, CommandError>;

pub struct ActionHandler {
    build: ActionBuilder,
}

impl ActionHandler {
    pub fn new(build: ActionBuilder) -> Self {
        Self { build }
    }

    pub fn action(&self, args: &CommandArgs) -> Result<VehicleAction, CommandError> {
        (self.build)(args)
    }
}

#[async_trait]
impl CommandHandler for ActionHandler {
    async fn execute(&self, vehicle: &dyn Vehicle, args: &CommandArgs) -> Result<(), CommandError> {
        let action = self.action(args)?;
        debug!(?action, "sending vehicle action");
        vehicle.execute(&action).await?;
        Ok(())
    }
}

/// Placeholder for commands that only exist on the cloud API.
pub struct FleetApiHandler {
    pub name: String,
}

#[async_trait]
impl CommandHandler for FleetApiHandler {
    async fn execute(&self, _vehicle: &dyn Vehicle, _args: &CommandArgs) -> Result<(), CommandError> {
        Err(CommandError::FleetApiOnly(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybridge_core::{DeviceError, Domain};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingVehicle {
        sent: Mutex<Vec<VehicleAction>>,
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
            self.sent.lock().unwrap().push(action.clone());
            Ok(())
        }
        async fn disconnect(&self) {}
    }

    fn charge_limit(args: &CommandArgs) -> Result<VehicleAction, CommandError> {
        Ok(VehicleAction::SetChargeLimit {
            percent: crate::args::int_arg(args, "percent", 50, 100)?,
        })
    }

    #[tokio::test]
    async fn action_handler_sends_parsed_action() {
        let vehicle = RecordingVehicle::default();
        let handler = ActionHandler::new(charge_limit);

        handler
            .execute(&vehicle, &CommandArgs::new().with("percent", "90"))
            .await
            .unwrap();

        assert_eq!(
            *vehicle.sent.lock().unwrap(),
            vec![VehicleAction::SetChargeLimit { percent: 90 }]
        );
    }

    #[tokio::test]
    async fn parse_failure_never_reaches_vehicle() {
        let vehicle = RecordingVehicle::default();
        let handler = ActionHandler::new(charge_limit);

        let err = handler
            .execute(&vehicle, &CommandArgs::new().with("percent", "120"))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::InvalidArgument { .. }));
        assert!(vehicle.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fleet_handler_always_fails() {
        let vehicle = RecordingVehicle::default();
        let handler = FleetApiHandler { name: "product-info".into() };
        let err = handler.execute(&vehicle, &CommandArgs::new()).await.unwrap_err();
        assert!(err.to_string().contains("product-info"));
    }
}
