/// Command descriptor types.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keybridge_core::DeviceError;
use serde::Serialize;
use thiserror::Error;

use crate::handlers::CommandHandler;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing {0} parameter. use help query string for a complete list of arguments")]
    MissingArgument(String),

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidArgument {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Method {0} is only supported via Fleet API")]
    FleetApiOnly(String),

    #[error("Method {0} is only supported via Authentication")]
    AuthRequired(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

// ---------------------------------------------------------------------------
// Arg
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CommandArg {
    pub name: String,
    pub help: String,
}

/// Argument values bound to a descriptor. Every declared argument is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    values: HashMap<String, String>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Value of a declared argument.
    pub fn get(&self, name: &str) -> Result<&str, CommandError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CommandError::MissingArgument(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A registry entry: everything the gateway needs to validate and run one
/// command.
#[derive(Clone, Serialize)]
pub struct CommandDescriptor {
    /// Unique key, also the URL path segment (e.g. "charging-set-limit").
    pub name: String,
    pub help: String,
    pub args: Vec<CommandArg>,
    /// Needs a loaded private key.
    pub requires_auth: bool,
    /// Only reachable through the cloud API; never served locally.
    pub requires_fleet_api: bool,
    #[serde(skip)]
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    /// Bind query parameters to the declared arguments.
    ///
    /// Fails on the first declared argument that is absent; extra parameters
    /// are ignored.
    pub fn bind_args(&self, query: &HashMap<String, String>) -> Result<CommandArgs, CommandError> {
        let mut args = CommandArgs::new();
        for arg in &self.args {
            match query.get(&arg.name) {
                Some(value) => args.values.insert(arg.name.clone(), value.clone()),
                None => return Err(CommandError::MissingArgument(arg.name.clone())),
            };
        }
        Ok(args)
    }

    /// Whether this command belongs in the listing served at `/`.
    pub fn is_listable(&self, key_loaded: bool) -> bool {
        !self.requires_fleet_api && (!self.requires_auth || key_loaded)
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("requires_auth", &self.requires_auth)
            .field("requires_fleet_api", &self.requires_fleet_api)
            .finish_non_exhaustive()
    }
}
