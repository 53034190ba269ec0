pub mod generation;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                                   WebSocket (progress events)
///
/// /generate-with-multiple-images        compose + generate + identity transfer
/// /edit-with-openai                     compose + edit + identity transfer
/// /edit-images-with-openai              direct edit
/// /combine                              compose + edit
/// /validation-rules                     published input limits (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(generation::router())
}
