use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the single vehicle this process talks to (its VIN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Security domain a session is negotiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Vehicle security controller. Reachable while the car sleeps; handles
    /// wake, locks and closures.
    VehicleSecurity,
    /// Infotainment computer. Only reachable once the car is awake.
    Infotainment,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::VehicleSecurity, Domain::Infotainment];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::VehicleSecurity => f.write_str("vcsec"),
            Domain::Infotainment => f.write_str("infotainment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Owner,
    Driver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormFactor {
    NfcCard,
    IosDevice,
    AndroidDevice,
    CloudKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatPosition {
    FrontLeft,
    FrontRight,
}

/// A fully-validated command ready to be encoded for the vehicle.
///
/// One variant per locally-servable command; arguments are already parsed
/// into their typed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VehicleAction {
    Wake,
    Ping,
    Lock,
    Unlock,
    Honk,
    FlashLights,
    FrunkOpen,
    TrunkOpen,
    TrunkClose,
    ChargePortOpen,
    ChargePortClose,
    ChargeStart,
    ChargeStop,
    ChargingScheduleCancel,
    SetChargeLimit { percent: u8 },
    SetChargingAmps { amps: u8 },
    ClimateOn,
    ClimateOff,
    SetTemperature { celsius: f32 },
    AutoSeatAndClimate { positions: Vec<SeatPosition>, enabled: bool },
    SteeringWheelHeater { enabled: bool },
    SentryMode { enabled: bool },
    WindowsVent,
    WindowsClose,
    MediaTogglePlayback,
    SoftwareUpdateCancel,
    BodyControllerState,
    SessionInfo { public_key: Vec<u8>, domain: Domain },
    AddKeyRequest { public_key: Vec<u8>, role: KeyRole, form_factor: KeyFormFactor },
}

impl VehicleAction {
    /// The security domain that executes this action.
    pub fn domain(&self) -> Domain {
        match self {
            VehicleAction::Wake
            | VehicleAction::Lock
            | VehicleAction::Unlock
            | VehicleAction::FrunkOpen
            | VehicleAction::TrunkOpen
            | VehicleAction::TrunkClose
            | VehicleAction::BodyControllerState
            | VehicleAction::AddKeyRequest { .. } => Domain::VehicleSecurity,
            VehicleAction::SessionInfo { domain, .. } => *domain,
            _ => Domain::Infotainment,
        }
    }
}
