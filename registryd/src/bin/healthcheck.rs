//! Probe every server in a server list once and report the ones that answer.
//!
//! Usage: healthcheck <servers.csv> [registryd.toml]

use anyhow::{Context, Result};
use registryd::beacon::UdpProber;
use registryd::config::Config;
use registryd::registry::{filter_healthy, Registry};
use registryd::scheduler::check_all;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("healthcheck=info,registryd=warn"))
        )
        .init();

    let mut args = std::env::args().skip(1);
    let csv_path = args
        .next()
        .context("Usage: healthcheck <servers.csv> [registryd.toml]")?;
    let config = match args.next() {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::default(),
    };

    let data = tokio::fs::read(&csv_path)
        .await
        .with_context(|| format!("Failed to read {}", csv_path))?;
    let registry = Registry::new();
    let summary = registry
        .load(&data)
        .with_context(|| format!("Failed to parse servers from {}", csv_path))?;
    for skipped in &summary.skipped {
        tracing::warn!("Skipped record in {}: {}", csv_path, skipped);
    }

    tracing::info!("Sending healthchecks to {} servers", summary.loaded);
    let tick = check_all(&registry, &UdpProber, &config.healthcheck).await;

    let mut healthy: Vec<_> = filter_healthy(&registry.snapshot()).into_values().collect();
    healthy.sort_by(|a, b| a.hostport().cmp(&b.hostport()));
    for server in &healthy {
        let h = &server.health;
        tracing::info!(
            "Server: {} ({}:{}) healthy={} expired={} passed={} failed={}",
            server.name, server.ip, server.port,
            h.healthy, h.expired, h.consecutive_passed, h.consecutive_failed
        );
    }

    tracing::info!("{} of {} servers answered", tick.healthy, tick.checked);
    Ok(())
}
