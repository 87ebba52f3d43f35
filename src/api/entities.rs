use crate::api::error::ApiError;
use crate::state::{EntityData, World};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state for the entity/world API
pub struct EntityAppState {
    pub world: Arc<World>,
    pub max_body_bytes: usize,
}

/// Create entity/world API router
pub fn create_entity_router(state: Arc<EntityAppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route(
            "/entity/:entity",
            get(get_entity).post(put_entity).put(put_entity),
        )
        .route("/world", get(get_world).post(get_world))
        .route("/clear", get(clear_world).post(clear_world))
        .layer(body_limit)
        .with_state(state)
}

/// POST|PUT /entity/:entity - Replace an entity, respond with its current data
async fn put_entity(
    State(state): State<Arc<EntityAppState>>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;
    if body.len() > state.max_body_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    let data = parse_entity_body(&headers, &body)?;
    debug!(entity = %entity, fields = data.len(), "Setting entity over HTTP");

    state.world.set(&entity, data);
    Ok(Json(Value::Object(state.world.get(&entity))))
}

/// GET /entity/:entity - Entity data, `{}` if absent
async fn get_entity(
    State(state): State<Arc<EntityAppState>>,
    Path(entity): Path<String>,
) -> Json<Value> {
    Json(Value::Object(state.world.get(&entity)))
}

/// GET|POST /world - Whole world
async fn get_world(State(state): State<Arc<EntityAppState>>) -> Json<Value> {
    Json(Value::Object(state.world.snapshot()))
}

/// GET|POST /clear - Empty the world, respond with the (empty) world
async fn clear_world(State(state): State<Arc<EntityAppState>>) -> Json<Value> {
    info!("Clearing world over HTTP");
    state.world.clear();
    Json(Value::Object(state.world.snapshot()))
}

/// Decode a write body into entity data
///
/// Accepts a raw JSON object. Form-encoded requests fall back to parsing
/// the first form key as JSON, for clients that post JSON as a bare field.
pub(crate) fn parse_entity_body(headers: &HeaderMap, body: &[u8]) -> Result<EntityData, ApiError> {
    let err = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(data)) => return Ok(data),
        Ok(_) => return Err(ApiError::BadRequest("entity body must be a JSON object".to_string())),
        Err(e) => e,
    };

    if !is_form_encoded(headers) {
        return Err(ApiError::BadRequest(format!("invalid JSON body: {}", err)));
    }

    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid form body: {}", e)))?;
    let (key, _) = fields
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("empty body".to_string()))?;

    match serde_json::from_str::<Value>(&key) {
        Ok(Value::Object(data)) => Ok(data),
        Ok(_) => Err(ApiError::BadRequest("entity body must be a JSON object".to_string())),
        Err(e) => Err(ApiError::BadRequest(format!("invalid JSON in form body: {}", e))),
    }
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}
