use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use registryd::beacon::{Prober, UdpProber};
use registryd::config::Config;
use registryd::ingest::{AddressFilter, Ingestor};
use registryd::registry::Registry;
use registryd::{api, checkpoint, ingest, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("registryd=info"))
        )
        .init();

    tracing::info!("Starting registryd");

    // Load config; a missing file means defaults
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/registryd/registryd.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path))?;
        tracing::info!("Loaded config from {}", config_path);
        config
    } else {
        tracing::warn!("Config file {} not found, using defaults", config_path);
        Config::default()
    };

    let filter = AddressFilter::new(&config.beacon.ignored_networks)
        .context("Invalid beacon.ignored_networks")?;

    // Restore servers from the last checkpoint or the seed list
    let registry = Registry::new();
    checkpoint::load_initial(&registry, &config.registry).await;

    let ingestor = Ingestor::new(registry.clone(), filter);
    let prober: Arc<dyn Prober> = Arc::new(UdpProber);

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn beacon listener and ingestion tasks
    let socket = UdpSocket::bind(&config.beacon.listen)
        .await
        .with_context(|| format!("Failed to bind beacon socket to {}", config.beacon.listen))?;
    let (beacon_tx, beacon_rx) = mpsc::channel(256);
    let listener_cancel = cancel.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = ingest::listener::run_listener(socket, beacon_tx, listener_cancel).await {
            tracing::error!("Beacon listener error: {}", e);
        }
    });

    let ingest_cancel = cancel.clone();
    let ingest_ingestor = ingestor.clone();
    let ingest_handle = tokio::spawn(async move {
        if let Err(e) = ingest::run(ingest_ingestor, beacon_rx, ingest_cancel).await {
            tracing::error!("Beacon ingestion error: {}", e);
        }
    });

    // Spawn healthcheck scheduler
    let scheduler_cancel = cancel.clone();
    let scheduler_registry = registry.clone();
    let scheduler_prober = prober.clone();
    let scheduler_config = config.healthcheck.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler::run(
            scheduler_registry,
            scheduler_prober,
            scheduler_config,
            scheduler_cancel,
        )
        .await
        {
            tracing::error!("Healthcheck scheduler error: {}", e);
        }
    });

    // Spawn checkpoint writer
    let checkpoint_cancel = cancel.clone();
    let checkpoint_registry = registry.clone();
    let checkpoint_config = config.registry.clone();
    let checkpoint_handle = tokio::spawn(async move {
        if let Err(e) = checkpoint::run(checkpoint_registry, checkpoint_config, checkpoint_cancel).await {
            tracing::error!("Checkpoint writer error: {:#}", e);
        }
    });

    // Build API router
    let app_state = api::routes::AppState {
        hash_rx: registry.hash_receiver(),
        registry: registry.clone(),
        ingestor,
        prober,
        healthcheck: Arc::new(config.healthcheck.clone()),
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(
        listener_handle,
        ingest_handle,
        scheduler_handle,
        checkpoint_handle,
        server_handle
    );

    tracing::info!("Shutdown complete");
    Ok(())
}
