//! WebSocket infrastructure for progress delivery.
//!
//! Provides connection registration with owner and generation groups, the
//! client message protocol, heartbeat pings, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;
pub mod protocol;

pub use handler::{handle_client_message, ws_handler};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
