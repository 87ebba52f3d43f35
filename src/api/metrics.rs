use crate::state::{MetricsSnapshot, SlowListenerPolicy, World};
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct MetricsResponse {
    pub entities: usize,
    pub listeners: usize,
    pub slow_listener_policy: &'static str,
    #[serde(flatten)]
    pub hub: MetricsSnapshot,
}

pub fn create_metrics_router(world: Arc<World>) -> Router {
    Router::new()
        .route("/api/metrics", get(get_metrics))
        .with_state(world)
}

/// GET /api/metrics
async fn get_metrics(State(world): State<Arc<World>>) -> Json<MetricsResponse> {
    let hub = world.hub();
    Json(MetricsResponse {
        entities: world.len(),
        listeners: hub.listener_count(),
        slow_listener_policy: match hub.policy() {
            SlowListenerPolicy::Drop => "drop",
            SlowListenerPolicy::Disconnect => "disconnect",
        },
        hub: hub.metrics.get_snapshot(),
    })
}
