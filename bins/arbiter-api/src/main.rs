mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use arbiter_common::config::RunnerConfig;
use arbiter_engine::docker::DockerProvider;
use arbiter_engine::{LanguageRegistry, Orchestrator};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

pub struct AppState {
    pub orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    info!("Arbiter API booting...");

    let config = RunnerConfig::from_env().context("Invalid configuration")?;

    let registry = LanguageRegistry::from_config(&config)?;

    info!(
        languages = ?registry.supported(),
        default = registry.default_language(),
        "Loaded language profiles"
    );

    let provider = DockerProvider::connect(config.sandbox.clone())
        .context("Failed to initialize environment provider")?;

    info!(
        template = %config.template_id,
        compile_timeout_ms = config.compile_timeout.as_millis() as u64,
        run_timeout_ms = config.run_timeout.as_millis() as u64,
        "Environment provider ready"
    );

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(Arc::new(provider), Arc::new(registry), config),
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal, finishing in-flight requests...");
}
