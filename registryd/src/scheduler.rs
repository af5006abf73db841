use std::sync::Arc;
use std::time::Duration;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{GameServer, Hostport, ServerMap};
use crate::beacon::{decode_report, Prober};
use crate::config::HealthcheckConfig;
use crate::health::{apply_probe_outcome, ProbeOutcome, Thresholds, Transition};
use crate::registry::Registry;

/// Counts from one healthcheck round
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub checked: usize,
    pub healthy: usize,
    pub marked_healthy: usize,
    pub marked_unhealthy: usize,
    pub expired: usize,
}

/// Probe every known server concurrently and commit the results as one
/// replacement of the registry contents.
pub async fn check_all(
    registry: &Registry,
    prober: &dyn Prober,
    config: &HealthcheckConfig,
) -> TickSummary {
    let probed = registry.snapshot();
    let thresholds = config.thresholds();
    let timeout = config.timeout();

    let mut pending: FuturesUnordered<_> = probed
        .iter()
        .map(|(id, server)| check_one(id.clone(), server.clone(), prober, timeout, thresholds))
        .collect();

    let mut summary = TickSummary::default();
    let mut checked = ServerMap::with_capacity(probed.len());
    while let Some((id, server, transition)) = pending.next().await {
        summary.checked += 1;
        match transition {
            Transition::Expire => {
                summary.expired += 1;
                continue;
            }
            Transition::MarkedHealthy => summary.marked_healthy += 1,
            Transition::MarkedUnhealthy => summary.marked_unhealthy += 1,
            Transition::Keep => {}
        }
        if server.health.healthy {
            summary.healthy += 1;
        }
        checked.insert(id, server);
    }

    registry.commit_checked(checked, &probed);
    summary
}

async fn check_one(
    id: Hostport,
    server: GameServer,
    prober: &dyn Prober,
    timeout: Duration,
    thresholds: Thresholds,
) -> (Hostport, GameServer, Transition) {
    let port = server.probe_port();

    // The prober is given the timeout too, but a misbehaving one must not
    // hold up the round.
    let outcome = match tokio::time::timeout(timeout, prober.probe(&server.ip, port, timeout)).await {
        Ok(Ok(data)) => match decode_report(&server.ip, &data) {
            Ok(report) => ProbeOutcome::Passed(Some(report)),
            Err(e) => {
                tracing::debug!("Failed to decode report from {}:{}: {}", server.ip, port, e);
                ProbeOutcome::Passed(None)
            }
        },
        // Refused connections and timeouts are routine
        Ok(Err(_)) | Err(_) => ProbeOutcome::Failed,
    };

    let (server, transition) = apply_probe_outcome(server, outcome, &thresholds);
    (id, server, transition)
}

/// Healthcheck loop. In-flight probes are abandoned on cancellation.
pub async fn run(
    registry: Registry,
    prober: Arc<dyn Prober>,
    config: HealthcheckConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => break,
        }

        tokio::select! {
            summary = check_all(&registry, prober.as_ref(), &config) => {
                tracing::info!(
                    "Healthcheck complete: {} healthy out of {} ({} recovered, {} hidden, {} expired)",
                    summary.healthy,
                    summary.checked,
                    summary.marked_healthy,
                    summary.marked_unhealthy,
                    summary.expired
                );
            }
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Healthcheck scheduler shutting down");
    Ok(())
}
