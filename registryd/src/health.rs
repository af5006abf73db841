//! Health state machine.
//!
//! A server is hidden after `unhealthy` consecutive failed checks, listed
//! again after `healthy` consecutive passed checks, and dropped after
//! `expiry` consecutive failed checks. Going down is slow and coming back is
//! fast, so a flapping server disappears rarely and reappears immediately.

use chrono::Utc;
use shared::types::{is_listable_name, GameMode, GameServer};
use crate::beacon::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub healthy: u32,
    pub unhealthy: u32,
    pub expiry: u32,
}

/// Result of one health probe.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// The server answered. `None` when its report could not be decoded.
    Passed(Option<Report>),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Keep,
    MarkedUnhealthy,
    MarkedHealthy,
    /// Failed long enough to be removed from the registry.
    Expire,
}

pub fn apply_probe_outcome(
    mut server: GameServer,
    outcome: ProbeOutcome,
    thresholds: &Thresholds,
) -> (GameServer, Transition) {
    if server.health.expired {
        return (server, Transition::Expire);
    }

    let transition = match outcome {
        ProbeOutcome::Failed => record_failure(&mut server, thresholds),
        ProbeOutcome::Passed(report) => record_success(&mut server, report, thresholds),
    };

    if server.health.expired {
        return (server, Transition::Expire);
    }
    (server, transition)
}

fn record_failure(server: &mut GameServer, thresholds: &Thresholds) -> Transition {
    let health = &mut server.health;
    health.consecutive_passed = 0;
    health.consecutive_failed = health.consecutive_failed.saturating_add(1);

    let mut transition = Transition::Keep;
    if health.healthy && health.consecutive_failed >= thresholds.unhealthy {
        health.healthy = false;
        tracing::info!(
            "Server is now unhealthy: {} ({}:{}) after {} failed checks",
            server.name, server.ip, server.port, health.consecutive_failed
        );
        transition = Transition::MarkedUnhealthy;
    }
    if health.consecutive_failed >= thresholds.expiry {
        health.expired = true;
        tracing::warn!(
            "Server expired: {} ({}:{}) after {} failed checks",
            server.name, server.ip, server.port, health.consecutive_failed
        );
    }
    transition
}

fn record_success(
    server: &mut GameServer,
    report: Option<Report>,
    thresholds: &Thresholds,
) -> Transition {
    server.health.consecutive_failed = 0;
    server.health.consecutive_passed = server.health.consecutive_passed.saturating_add(1);
    server.health.last_passed = Some(Utc::now());

    // Name and mode may have changed since registration
    match report.as_ref().and_then(usable_fields) {
        Some((name, mode, beacon_port)) => {
            server.name = name;
            server.game_mode = mode;
            if beacon_port.is_some() {
                server.beacon_port = beacon_port;
            }
            server.health.last_parse_failed = false;
        }
        None => {
            tracing::debug!("Unusable report from {}:{}", server.ip, server.port);
            server.health.last_parse_failed = true;
        }
    }

    let health = &mut server.health;
    if !health.healthy && health.consecutive_passed >= thresholds.healthy {
        health.healthy = true;
        tracing::info!("Server is now healthy: {} ({}:{})", server.name, server.ip, server.port);
        return Transition::MarkedHealthy;
    }
    Transition::Keep
}

fn usable_fields(report: &Report) -> Option<(String, GameMode, Option<u16>)> {
    if !is_listable_name(&report.name) {
        return None;
    }
    let mode = GameMode::from_mode_name(&report.mode)?;
    Some((report.name.clone(), mode, report.beacon_port))
}
