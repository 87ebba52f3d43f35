use crate::api::error::ApiError;
use crate::state::World;
use crate::subscription::Session;
use axum::{
    extract::{ws::WebSocketUpgrade, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state for WebSocket handler
pub struct WsAppState {
    pub world: Arc<World>,
    pub queue_capacity: usize,
    pub max_listeners: Option<usize>,
}

/// Listener bound: runs as a tower layer BEFORE WebSocket upgrade extraction
/// so 503 is returned without requiring a valid upgrade request.
async fn listener_limit(
    State(state): State<Arc<WsAppState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(limit) = state.max_listeners {
        let hub = state.world.hub();
        hub.prune();
        let current = hub.listener_count();
        if current >= limit {
            warn!(listeners = current, limit = limit, "Rejecting subscriber, limit reached");
            return ApiError::TooManySubscribers.into_response();
        }
    }
    next.run(req).await
}

/// GET <path> - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| async move {
        let subscription = state.world.subscribe(state.queue_capacity);
        Session::new(Arc::clone(&state.world), subscription)
            .run(socket)
            .await;
    })
}

/// Create WebSocket router at `path` with the listener bound applied
pub fn create_ws_router(path: &str, state: Arc<WsAppState>) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), listener_limit))
        .with_state(state)
}
