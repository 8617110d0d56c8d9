/// Command registry: the built-in vehicle commands, keyed and sorted by name.
use std::collections::BTreeMap;
use std::sync::Arc;

use keybridge_core::VehicleAction;

use crate::args::{
    bool_arg, domain_arg, form_factor_arg, int_arg, public_key_arg, role_arg, seats_arg,
    temperature_arg,
};
use crate::handlers::{ActionBuilder, ActionHandler, FleetApiHandler};
use crate::types::{CommandArg, CommandDescriptor};

fn arg(name: &str, help: &str) -> CommandArg {
    CommandArg {
        name: name.to_string(),
        help: help.to_string(),
    }
}

/// A locally-servable command.
fn local(
    name: &str,
    help: &str,
    args: Vec<CommandArg>,
    requires_auth: bool,
    build: ActionBuilder,
) -> CommandDescriptor {
    CommandDescriptor {
        name: name.to_string(),
        help: help.to_string(),
        args,
        requires_auth,
        requires_fleet_api: false,
        handler: Arc::new(ActionHandler::new(build)),
    }
}

fn authed(name: &str, help: &str, args: Vec<CommandArg>, build: ActionBuilder) -> CommandDescriptor {
    local(name, help, args, true, build)
}

fn fleet(name: &str, help: &str, args: Vec<CommandArg>) -> CommandDescriptor {
    CommandDescriptor {
        name: name.to_string(),
        help: help.to_string(),
        args,
        requires_auth: true,
        requires_fleet_api: true,
        handler: Arc::new(FleetApiHandler { name: name.to_string() }),
    }
}

/// Build the full built-in command set.
pub fn builtin_commands() -> Vec<CommandDescriptor> {
    vec![
        // Unauthenticated
        local("wake", "Wake up vehicle", vec![], false, |_| Ok(VehicleAction::Wake)),
        local(
            "body-controller-state",
            "Fetch limited vehicle state information. Works over BLE when infotainment is asleep.",
            vec![],
            false,
            |_| Ok(VehicleAction::BodyControllerState),
        ),
        local(
            "session-info",
            "Retrieve session info for PUBLIC_KEY from DOMAIN",
            vec![
                arg("public_key", "Hex-encoded uncompressed public key"),
                arg("domain", "vcsec or infotainment"),
            ],
            false,
            |a| {
                Ok(VehicleAction::SessionInfo {
                    public_key: public_key_arg(a, "public_key")?,
                    domain: domain_arg(a, "domain")?,
                })
            },
        ),
        local(
            "add-key-request",
            "Request NFC-card approval for an enrolling PUBLIC_KEY with ROLE and FORM_FACTOR",
            vec![
                arg("public_key", "Hex-encoded uncompressed public key"),
                arg("role", "owner or driver"),
                arg("form_factor", "nfc_card, ios_device, android_device or cloud_key"),
            ],
            false,
            |a| {
                Ok(VehicleAction::AddKeyRequest {
                    public_key: public_key_arg(a, "public_key")?,
                    role: role_arg(a, "role")?,
                    form_factor: form_factor_arg(a, "form_factor")?,
                })
            },
        ),
        // Security and closures
        authed("lock", "Lock vehicle", vec![], |_| Ok(VehicleAction::Lock)),
        authed("unlock", "Unlock vehicle", vec![], |_| Ok(VehicleAction::Unlock)),
        authed("frunk-open", "Open vehicle frunk. Note that there's no frunk-close command!", vec![], |_| {
            Ok(VehicleAction::FrunkOpen)
        }),
        authed("trunk-open", "Open vehicle trunk. Note that trunk-close only works on certain vehicle types.", vec![], |_| {
            Ok(VehicleAction::TrunkOpen)
        }),
        authed("trunk-close", "Closes vehicle trunk. Only works on certain vehicle types.", vec![], |_| {
            Ok(VehicleAction::TrunkClose)
        }),
        authed("windows-vent", "Vent all windows", vec![], |_| Ok(VehicleAction::WindowsVent)),
        authed("windows-close", "Close all windows", vec![], |_| Ok(VehicleAction::WindowsClose)),
        authed(
            "sentry-mode",
            "Set sentry mode to STATE ('on' or 'off')",
            vec![arg("state", "'on' or 'off'")],
            |a| Ok(VehicleAction::SentryMode { enabled: bool_arg(a, "state")? }),
        ),
        // Signals
        authed("honk", "Honk horn", vec![], |_| Ok(VehicleAction::Honk)),
        authed("flash-lights", "Flash lights", vec![], |_| Ok(VehicleAction::FlashLights)),
        authed("ping", "Ping vehicle", vec![], |_| Ok(VehicleAction::Ping)),
        // Charging
        authed("charge-port-open", "Open charge port", vec![], |_| Ok(VehicleAction::ChargePortOpen)),
        authed("charge-port-close", "Close charge port", vec![], |_| Ok(VehicleAction::ChargePortClose)),
        authed("charging-start", "Start charging", vec![], |_| Ok(VehicleAction::ChargeStart)),
        authed("charging-stop", "Stop charging", vec![], |_| Ok(VehicleAction::ChargeStop)),
        authed(
            "charging-schedule-cancel",
            "Cancel scheduled charge start",
            vec![],
            |_| Ok(VehicleAction::ChargingScheduleCancel),
        ),
        authed(
            "charging-set-limit",
            "Set charge limit to PERCENT",
            vec![arg("percent", "Charging limit between 50 and 100")],
            |a| Ok(VehicleAction::SetChargeLimit { percent: int_arg(a, "percent", 50, 100)? }),
        ),
        authed(
            "charging-set-amps",
            "Set charge current to AMPS",
            vec![arg("amps", "Charging current between 0 and 48")],
            |a| Ok(VehicleAction::SetChargingAmps { amps: int_arg(a, "amps", 0, 48)? }),
        ),
        // Climate
        authed("climate-on", "Turn on climate control", vec![], |_| Ok(VehicleAction::ClimateOn)),
        authed("climate-off", "Turn off climate control", vec![], |_| Ok(VehicleAction::ClimateOff)),
        authed(
            "climate-set-temp",
            "Set temperature (Celsius by default)",
            vec![arg("temp", "Desired temperature (e.g., 70F or 21C; defaults to Celsius)")],
            |a| Ok(VehicleAction::SetTemperature { celsius: temperature_arg(a, "temp")? }),
        ),
        authed(
            "auto-seat-and-climate",
            "Turn on automatic seat heating and HVAC",
            vec![
                arg("positions", "Comma separated seats: front-left, front-right"),
                arg("enabled", "'on' or 'off'"),
            ],
            |a| {
                Ok(VehicleAction::AutoSeatAndClimate {
                    positions: seats_arg(a, "positions")?,
                    enabled: bool_arg(a, "enabled")?,
                })
            },
        ),
        authed(
            "steering-wheel-heater",
            "Set steering wheel heater to STATE ('on' or 'off')",
            vec![arg("state", "'on' or 'off'")],
            |a| Ok(VehicleAction::SteeringWheelHeater { enabled: bool_arg(a, "state")? }),
        ),
        // Infotainment
        authed(
            "media-toggle-playback",
            "Toggle between play/pause",
            vec![],
            |_| Ok(VehicleAction::MediaTogglePlayback),
        ),
        authed(
            "software-update-cancel",
            "Cancel a pending software update",
            vec![],
            |_| Ok(VehicleAction::SoftwareUpdateCancel),
        ),
        // Cloud-only
        fleet("product-info", "Print JSON product info", vec![]),
        fleet(
            "get",
            "GET an owner API http ENDPOINT",
            vec![arg("endpoint", "Fleet API endpoint")],
        ),
        fleet(
            "post",
            "POST to an owner API http ENDPOINT",
            vec![arg("endpoint", "Fleet API endpoint")],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for def in builtin_commands() {
            registry.register(def);
        }
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace a command. Only valid before the registry is shared.
    pub fn register(&mut self, def: CommandDescriptor) {
        self.commands.insert(def.name.clone(), def);
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name)
    }

    /// All commands, sorted by name.
    pub fn list(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    /// Commands that can be served with or without a private key.
    pub fn listable(&self, key_loaded: bool) -> impl Iterator<Item = &CommandDescriptor> {
        self.list().filter(move |c| c.is_listable(key_loaded))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
