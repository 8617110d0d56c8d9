//! Vehicle command registry.
//!
//! Each command is described by a [`CommandDescriptor`]: its URL name, help
//! text, declared arguments, authorization flags and the handler that turns
//! bound arguments into a [`keybridge_core::VehicleAction`].

pub mod args;
pub mod handlers;
pub mod registry;
pub mod types;

pub use handlers::{ActionBuilder, ActionHandler, CommandHandler, FleetApiHandler};
pub use registry::{builtin_commands, CommandRegistry};
pub use types::{CommandArg, CommandArgs, CommandDescriptor, CommandError};
