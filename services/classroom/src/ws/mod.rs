//! WebSocket Dialog Sessions
//!
//! - `protocol`: the JSON message format between browser and server.
//! - `session`: one connection, one orchestrator, from upgrade to close.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
