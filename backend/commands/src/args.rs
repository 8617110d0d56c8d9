/// Typed argument parsing for command handlers.
use keybridge_core::{Domain, KeyFormFactor, KeyRole, SeatPosition};

use crate::types::{CommandArgs, CommandError};

const MIN_CELSIUS: f32 = 15.0;
const MAX_CELSIUS: f32 = 28.0;

fn invalid(name: &str, value: &str, reason: impl Into<String>) -> CommandError {
    CommandError::InvalidArgument {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn bool_arg(args: &CommandArgs, name: &str) -> Result<bool, CommandError> {
    let value = args.get(name)?;
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(invalid(name, value, "expected on or off")),
    }
}

pub fn int_arg(args: &CommandArgs, name: &str, min: u8, max: u8) -> Result<u8, CommandError> {
    let value = args.get(name)?;
    let parsed: u8 = value
        .trim()
        .parse()
        .map_err(|_| invalid(name, value, "expected an integer"))?;
    if parsed < min || parsed > max {
        return Err(invalid(name, value, format!("must be between {min} and {max}")));
    }
    Ok(parsed)
}

/// Temperature in Celsius. A trailing `F` marks Fahrenheit, a trailing `C`
/// (or nothing) Celsius.
pub fn temperature_arg(args: &CommandArgs, name: &str) -> Result<f32, CommandError> {
    let value = args.get(name)?;
    let trimmed = value.trim();
    let (number, fahrenheit) = match trimmed.chars().last() {
        Some('F' | 'f') => (&trimmed[..trimmed.len() - 1], true),
        Some('C' | 'c') => (&trimmed[..trimmed.len() - 1], false),
        _ => (trimmed, false),
    };
    let degrees: f32 = number
        .trim()
        .parse()
        .map_err(|_| invalid(name, value, "expected a temperature such as 21C or 70F"))?;
    let celsius = if fahrenheit {
        (degrees - 32.0) * 5.0 / 9.0
    } else {
        degrees
    };
    if !(MIN_CELSIUS..=MAX_CELSIUS).contains(&celsius) {
        return Err(invalid(
            name,
            value,
            format!("must be between {MIN_CELSIUS}C and {MAX_CELSIUS}C"),
        ));
    }
    Ok(celsius)
}

/// Hex-encoded uncompressed P-256 point.
pub fn public_key_arg(args: &CommandArgs, name: &str) -> Result<Vec<u8>, CommandError> {
    let value = args.get(name)?;
    let bytes = hex::decode(value.trim()).map_err(|e| invalid(name, value, e.to_string()))?;
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(invalid(name, value, "expected a 65-byte uncompressed public key"));
    }
    Ok(bytes)
}

pub fn role_arg(args: &CommandArgs, name: &str) -> Result<KeyRole, CommandError> {
    let value = args.get(name)?;
    match value.to_ascii_lowercase().as_str() {
        "owner" => Ok(KeyRole::Owner),
        "driver" => Ok(KeyRole::Driver),
        _ => Err(invalid(name, value, "expected owner or driver")),
    }
}

pub fn form_factor_arg(args: &CommandArgs, name: &str) -> Result<KeyFormFactor, CommandError> {
    let value = args.get(name)?;
    match value.to_ascii_lowercase().as_str() {
        "nfc_card" => Ok(KeyFormFactor::NfcCard),
        "ios_device" => Ok(KeyFormFactor::IosDevice),
        "android_device" => Ok(KeyFormFactor::AndroidDevice),
        "cloud_key" => Ok(KeyFormFactor::CloudKey),
        _ => Err(invalid(
            name,
            value,
            "expected nfc_card, ios_device, android_device or cloud_key",
        )),
    }
}

pub fn domain_arg(args: &CommandArgs, name: &str) -> Result<Domain, CommandError> {
    let value = args.get(name)?;
    match value.to_ascii_lowercase().as_str() {
        "vcsec" => Ok(Domain::VehicleSecurity),
        "infotainment" => Ok(Domain::Infotainment),
        _ => Err(invalid(name, value, "expected vcsec or infotainment")),
    }
}

/// Comma separated seat list, e.g. `front-left,front-right`.
pub fn seats_arg(args: &CommandArgs, name: &str) -> Result<Vec<SeatPosition>, CommandError> {
    let value = args.get(name)?;
    let mut seats = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let seat = match part.to_ascii_lowercase().as_str() {
            "front-left" => SeatPosition::FrontLeft,
            "front-right" => SeatPosition::FrontRight,
            _ => return Err(invalid(name, value, format!("unknown seat {part}"))),
        };
        if !seats.contains(&seat) {
            seats.push(seat);
        }
    }
    if seats.is_empty() {
        return Err(invalid(name, value, "expected at least one seat"));
    }
    Ok(seats)
}
