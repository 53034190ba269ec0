use std::path::PathBuf;
use std::sync::Arc;

use modelgen_events::EventBus;
use modelgen_ledger::AccountDirectory;
use modelgen_pipeline::Orchestrator;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Connection registration for browser sockets.
    pub ws_manager: Arc<WsManager>,
    /// Bus the orchestrator publishes progress on.
    pub event_bus: Arc<EventBus>,
    pub orchestrator: Arc<Orchestrator>,
    /// Owner lookup for bearer-authenticated requests.
    pub accounts: Arc<dyn AccountDirectory>,
    /// Directory served at `/media` when objects are stored locally.
    pub media_dir: Option<PathBuf>,
}
