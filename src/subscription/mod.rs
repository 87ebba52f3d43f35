// WebSocket subscription sessions and wire message shapes

pub mod manager;
pub mod protocol;

pub use manager::{apply_inbound, Session};
pub use protocol::{entity_message, parse_inbound, snapshot_message, InboundUpdate};
