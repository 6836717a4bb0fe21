// Main entry point for the cleanse server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cleanse_core::domains::cleanse::{CleanseService, MemoryJobStore};
use cleanse_core::kernel::HttpBrowserProvider;
use cleanse_core::{server::build_app, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long finished jobs stay observable in the registry.
const FINISHED_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);
const REGISTRY_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cleanse_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Profile Cleanse server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;

    let mut provider = HttpBrowserProvider::new();
    if let Some(user_agent) = &config.browser_user_agent {
        provider = provider.with_user_agent(user_agent.clone());
    }

    let service = Arc::new(CleanseService::new(
        Arc::new(MemoryJobStore::new()),
        Arc::new(provider),
        config.runner_settings(),
        config.upload_dir.clone(),
        config.stream_poll_interval,
    ));

    // Evict finished jobs from the live registry
    let registry = service.registry().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REGISTRY_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            registry.cleanup(FINISHED_JOB_RETENTION);
        }
    });

    let app = build_app(service, config.allowed_origins.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}
