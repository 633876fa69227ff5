//! Botline sign-in orchestration core.
//!
//! This crate exposes the pieces a conversational bot needs to drive
//! multi-step OAuth/SSO sign-in over a channel: the activity and turn-state
//! model, the [`AuthConnection`](connection::AuthConnection) capability
//! contract, a connection registry, an exchange de-duplication tracker, and
//! the [`AuthManager`](manager::AuthManager) state machine that ties them
//! together.
pub mod activity;
pub mod connection;
pub mod context;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod response;
pub mod state;
pub mod telemetry;
pub mod tracker;

pub use activity::*;
pub use connection::*;
pub use context::*;
pub use error::*;
pub use manager::*;
pub use registry::*;
pub use response::*;
pub use state::*;
pub use tracker::*;

/// Returns the semantic version advertised by this crate.
///
/// ```
/// assert_eq!(botline_core::version(), "0.1.0");
/// ```
pub fn version() -> &'static str {
    "0.1.0"
}
