//! wolftrace server binary.
//!
//! Standalone server wiring the engine behind the REST and WebSocket
//! surface. Configuration comes from the YAML file at `CONFIG_PATH`
//! (default `config/wolftrace.yaml`) with `HOST`/`PORT` overrides.

use std::sync::Arc;

use wolftrace_core::Engine;
use wolftrace_server::{create_router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/wolftrace.yaml".to_string());
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => {
            tracing::info!(path = %config_path, "configuration loaded");
            config
        }
        Err(error) => {
            tracing::warn!(path = %config_path, %error, "no config file, using defaults");
            ServerConfig::default()
        }
    }
    .apply_env_overrides();

    let services = config.services.build_bundle();
    let speech = services.speech.clone();
    let engine = Arc::new(Engine::new(config.engine.clone(), services)?);
    engine.start();

    let state = AppState::new(engine.clone(), speech);
    let router = create_router(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "wolftrace server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down, draining in-flight analysis");
    engine.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
}
