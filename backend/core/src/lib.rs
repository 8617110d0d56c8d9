pub mod error;
pub mod key;
pub mod simulator;
pub mod traits;
pub mod types;

pub use error::{DeviceError, KeyError};
pub use key::{load_private_key, PrivateKey};
pub use traits::{Connector, Transport, Vehicle, VehicleFactory};
pub use types::{DeviceId, Domain, KeyFormFactor, KeyRole, SeatPosition, VehicleAction};
