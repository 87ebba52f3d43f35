// HTTP and WebSocket APIs

pub mod entities;
pub mod error;
pub mod metrics;
pub mod websocket;

pub use entities::{create_entity_router, EntityAppState};
pub use error::ApiError;
pub use metrics::create_metrics_router;
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::config::WorldcastConfig;
use crate::state::World;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

/// Build the full application router around one shared world
pub fn create_app(world: Arc<World>, config: &WorldcastConfig) -> Router {
    let entity_state = Arc::new(EntityAppState {
        world: Arc::clone(&world),
        max_body_bytes: config.api.max_body_bytes,
    });
    let ws_state = Arc::new(WsAppState {
        world: Arc::clone(&world),
        queue_capacity: config.subscription.queue_capacity,
        max_listeners: config.subscription.listener_limit(),
    });

    let landing = config.server.landing_path.clone();
    let app = Router::new()
        .route("/", get(move || landing_redirect(landing)))
        .nest_service("/static", ServeDir::new(&config.server.static_dir))
        .merge(create_entity_router(entity_state))
        .merge(create_ws_router(&config.subscription.path, ws_state))
        .merge(create_metrics_router(world));

    if config.api.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// GET / - 302 to the landing page
async fn landing_redirect(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
