//! Event-to-socket routing.

use std::sync::Arc;

use axum::extract::ws::Message;
use modelgen_events::ProgressEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Forwards progress events from the bus to live sockets.
///
/// Delivery is best-effort: an owner with no connection misses the event and
/// nothing is queued for later.
pub struct ProgressRouter {
    ws_manager: Arc<WsManager>,
}

impl ProgressRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<ProgressEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Progress router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, progress router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event. Returns the number of sockets reached.
    pub async fn route_event(&self, event: &ProgressEvent) -> usize {
        let message = Message::Text(event.to_wire().to_string().into());
        let delivered = self
            .ws_manager
            .deliver(event.owner_id, event.generation_id, message)
            .await;

        tracing::debug!(
            generation_id = %event.generation_id,
            owner_id = event.owner_id,
            event = %event.event,
            status = %event.status,
            delivered,
            "Progress event routed",
        );
        delivered
    }
}
