use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use worldcast::api::create_app;
use worldcast::config::{load_config, WorldcastConfig};
use worldcast::state::World;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worldcast=info".into()),
        )
        .init();

    info!("Worldcast starting...");

    // Config path from first argument or WORLDCAST_CONFIG; defaults otherwise
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WORLDCAST_CONFIG").ok());
    let mut config = match config_path {
        Some(path) => {
            info!(path = %path, "Loading configuration");
            load_config(&path)?
        }
        None => WorldcastConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;

    info!(
        bind_addr = %config.server.bind_addr,
        subscription_path = %config.subscription.path,
        queue_capacity = config.subscription.queue_capacity,
        slow_listener = ?config.subscription.slow_listener,
        max_listeners = config.subscription.max_listeners,
        "Configuration loaded"
    );

    let world = Arc::new(World::with_policy(config.subscription.slow_listener));
    let app = create_app(Arc::clone(&world), &config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!(entities = world.len(), "Worldcast stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
