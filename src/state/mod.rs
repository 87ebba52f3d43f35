// World state store and listener fan-out

mod entity;
mod hub;
mod metrics;
mod world;

pub use entity::{EntityData, WorldSnapshot};
pub use hub::{Hub, Listener, SlowListenerPolicy, MAX_QUEUE_CAPACITY};
pub use metrics::{HubMetrics, MetricsSnapshot};
pub use world::{Subscription, World};
