use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

pub use crate::state::{SlowListenerPolicy, MAX_QUEUE_CAPACITY};

/// Complete worldcast configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorldcastConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Listener address and landing page
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Directory served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Where GET / redirects to
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_landing_path() -> String {
    "/static/index.html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            landing_path: default_landing_path(),
        }
    }
}

/// Subscriber channel settings
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// WebSocket route
    #[serde(default = "default_subscription_path")]
    pub path: String,
    /// Per-listener outbound queue length
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub slow_listener: SlowListenerPolicy,
    /// 0 = unbounded
    #[serde(default)]
    pub max_listeners: usize,
}

fn default_subscription_path() -> String {
    "/subscribe".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

impl SubscriptionConfig {
    pub fn listener_limit(&self) -> Option<usize> {
        (self.max_listeners > 0).then_some(self.max_listeners)
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            path: default_subscription_path(),
            queue_capacity: default_queue_capacity(),
            slow_listener: SlowListenerPolicy::default(),
            max_listeners: 0,
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Largest accepted write body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_cors_permissive")]
    pub cors_permissive: bool,
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1 MB
}

fn default_cors_permissive() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            cors_permissive: default_cors_permissive(),
        }
    }
}

impl WorldcastConfig {
    /// Apply WORLDCAST_* env vars on top of the loaded values.
    /// Unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        let capacity = self.subscription.queue_capacity;
        if !(1..=MAX_QUEUE_CAPACITY).contains(&capacity) {
            bail!(
                "subscription.queue_capacity must be between 1 and {}, got {}",
                MAX_QUEUE_CAPACITY,
                capacity
            );
        }
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("WORLDCAST_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("WORLDCAST_QUEUE_CAPACITY") {
            match v.parse::<usize>() {
                Ok(n) if (1..=MAX_QUEUE_CAPACITY).contains(&n) => {
                    self.subscription.queue_capacity = n;
                }
                _ => {}
            }
        }
        if let Some(v) = lookup("WORLDCAST_SLOW_LISTENER") {
            if let Ok(policy) = v.parse::<SlowListenerPolicy>() {
                self.subscription.slow_listener = policy;
            }
        }
        if let Some(v) = lookup("WORLDCAST_MAX_LISTENERS") {
            if let Ok(n) = v.parse::<usize>() {
                self.subscription.max_listeners = n;
            }
        }
        if let Some(v) = lookup("WORLDCAST_MAX_BODY_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                self.api.max_body_bytes = n;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<WorldcastConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: WorldcastConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}
