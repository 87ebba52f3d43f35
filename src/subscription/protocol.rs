use crate::state::{EntityData, WorldSnapshot};
use anyhow::{bail, Context};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Server → Client: single-entity update `{name: data}`
pub fn entity_message(entity: &str, data: &EntityData) -> Arc<str> {
    let mut msg = Map::with_capacity(1);
    msg.insert(entity.to_string(), Value::Object(data.clone()));
    Arc::from(Value::Object(msg).to_string())
}

/// Server → Client: full world, sent once when a listener connects
pub fn snapshot_message(world: WorldSnapshot) -> Arc<str> {
    Arc::from(Value::Object(world).to_string())
}

/// Client → Server: one or more full-replace entity writes
#[derive(Debug, Default, PartialEq)]
pub struct InboundUpdate {
    /// Entities to set, in payload order
    pub entities: Vec<(String, EntityData)>,
    /// Entity names whose value was not a JSON object
    pub skipped: Vec<String>,
}

/// Parse an inbound frame of the form `{"name": {..}, ...}`
pub fn parse_inbound(text: &str) -> anyhow::Result<InboundUpdate> {
    if text.trim().is_empty() {
        bail!("empty payload");
    }

    let value: Value = serde_json::from_str(text).context("payload is not valid JSON")?;
    let Value::Object(map) = value else {
        bail!("payload is not a JSON object");
    };

    let mut update = InboundUpdate::default();
    for (name, data) in map {
        match data {
            Value::Object(data) => update.entities.push((name, data)),
            _ => update.skipped.push(name),
        }
    }
    Ok(update)
}
