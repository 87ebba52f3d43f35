// World state store and listener fan-out
pub mod state;

// HTTP and WebSocket APIs
pub mod api;

// Subscriber sessions and wire messages
pub mod subscription;

// Configuration
pub mod config;
