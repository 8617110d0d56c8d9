//! keybridge gateway HTTP surface.
//!
//! Serves the command listing at `/` and one route per registry command.

pub mod dispatcher;
pub mod listing;
pub mod server;

pub use dispatcher::{Dispatcher, Outcome, BAD_REQUEST_FIELD, ERROR_HEADER};
pub use listing::{render_help, render_listing, NO_KEY_WARNING};
pub use server::{bind, router, shutdown_signal, start_server, GatewayState};
