use serde_json::{Map, Value};

/// Entity data: opaque field name → JSON value mapping
pub type EntityData = Map<String, Value>;

/// Whole world: entity name → entity data (as a JSON object)
pub type WorldSnapshot = Map<String, Value>;
