//! Registration of servers from beacons and manual submissions.

pub mod filter;
pub mod listener;

use std::net::{IpAddr, SocketAddr};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use thiserror::Error;
use shared::types::{is_listable_name, GameMode, GameServer, Health, Hostport};
use crate::beacon::{decode_report, BeaconError, Report};
use crate::registry::Registry;

pub use filter::AddressFilter;
pub use listener::BeaconEvent;

/// Why a report did not lead to a registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("servers on {0} are not listed")]
    IgnoredAddress(String),
    #[error("invalid report: {0}")]
    Undecodable(#[from] BeaconError),
    #[error("server has no name")]
    MissingName,
    #[error("server name contains control characters")]
    InvalidName,
    #[error("server has no port")]
    MissingPort,
    #[error("unknown game mode {0:?}")]
    UnknownMode(String),
}

#[derive(Clone)]
pub struct Ingestor {
    registry: Registry,
    filter: AddressFilter,
}

impl Ingestor {
    pub fn new(registry: Registry, filter: AddressFilter) -> Self {
        Self { registry, filter }
    }

    /// Register or refresh the server described by `report`.
    ///
    /// A registration always replaces the previous entry for the same
    /// hostport and starts it healthy, since the server just answered.
    pub fn register_report(&self, report: Report) -> Result<Hostport, Rejection> {
        let allowed = report
            .ip
            .parse::<IpAddr>()
            .map(|ip| self.filter.allows(ip))
            .unwrap_or(false);
        if !allowed {
            return Err(Rejection::IgnoredAddress(report.ip));
        }
        if report.name.trim().is_empty() {
            return Err(Rejection::MissingName);
        }
        if !is_listable_name(&report.name) {
            return Err(Rejection::InvalidName);
        }
        if report.port == 0 {
            return Err(Rejection::MissingPort);
        }
        let game_mode = GameMode::from_mode_name(&report.mode)
            .ok_or_else(|| Rejection::UnknownMode(report.mode.clone()))?;

        let id = Hostport::new(&report.ip, report.port);
        let server = GameServer {
            name: report.name,
            ip: id.ip().to_string(),
            port: report.port,
            beacon_port: report.beacon_port,
            game_mode,
            health: Health::registered(),
        };

        if self.registry.upsert(id.clone(), server) {
            tracing::info!("Registered new server {} ({} total)", id, self.registry.len());
        } else {
            tracing::debug!("Refreshed server {}", id);
        }
        Ok(id)
    }

    /// Decode and register a beacon received from `from`.
    pub fn handle_datagram(&self, from: SocketAddr, payload: &[u8]) -> Result<Hostport, Rejection> {
        let ip = from.ip().to_canonical().to_string();
        let report = decode_report(&ip, payload)?;
        self.register_report(report)
    }
}

/// Ingestion loop - registers servers from received beacons.
/// Rejected beacons are dropped without a reply.
pub async fn run(
    ingestor: Ingestor,
    mut rx: mpsc::Receiver<BeaconEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                match event {
                    BeaconEvent::Received { from, payload } => {
                        if let Err(e) = ingestor.handle_datagram(from, &payload) {
                            tracing::debug!("Ignored beacon from {}: {}", from, e);
                        }
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Beacon ingestion shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::report::encode_report;
    use crate::registry::{csv, filter_healthy};

    fn ingestor() -> (Registry, Ingestor) {
        let registry = Registry::new();
        let ingestor = Ingestor::new(registry.clone(), AddressFilter::default());
        (registry, ingestor)
    }

    fn report(ip: &str, name: &str, port: u16, mode: &str) -> Report {
        Report {
            name: name.to_string(),
            ip: ip.to_string(),
            port,
            mode: mode.to_string(),
            beacon_port: None,
        }
    }

    #[test]
    fn test_register_lists_server() {
        let (registry, ingestor) = ingestor();
        let id = ingestor
            .register_report(report("1.2.3.4", "A", 7777, "RGM_TerroristHuntMode"))
            .unwrap();

        assert_eq!(id, Hostport::new("1.2.3.4", 7777));
        let listing = String::from_utf8(csv::encode(&filter_healthy(&registry.snapshot()))).unwrap();
        assert_eq!(listing, "name,ip,port,mode\nA,1.2.3.4,7777,coop");
    }

    #[test]
    fn test_reregistration_refreshes_and_revives() {
        let (registry, ingestor) = ingestor();
        let id = ingestor
            .register_report(report("1.2.3.4", "A", 7777, "RGM_TerroristHuntMode"))
            .unwrap();

        let mut stale = registry.get(&id).unwrap();
        stale.health.healthy = false;
        stale.health.consecutive_failed = 70;
        registry.upsert(id.clone(), stale);

        ingestor
            .register_report(report("1.2.3.4", "B", 7777, "RGM_BombAdvMode"))
            .unwrap();
        let server = registry.get(&id).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(server.name, "B");
        assert_eq!(server.game_mode, GameMode::Adversarial);
        assert!(server.health.healthy);
        assert_eq!(server.health.consecutive_failed, 0);
    }

    #[test]
    fn test_rejections_do_not_mutate() {
        let (registry, ingestor) = ingestor();

        assert_eq!(
            ingestor.register_report(report("192.168.1.10", "A", 7777, "RGM_MissionMode")),
            Err(Rejection::IgnoredAddress("192.168.1.10".to_string()))
        );
        assert_eq!(
            ingestor.register_report(report("1.2.3.4", "", 7777, "RGM_MissionMode")),
            Err(Rejection::MissingName)
        );
        assert_eq!(
            ingestor.register_report(report("1.2.3.4", "A", 0, "RGM_MissionMode")),
            Err(Rejection::MissingPort)
        );
        assert_eq!(
            ingestor.register_report(report("1.2.3.4", "A", 7777, "")),
            Err(Rejection::UnknownMode(String::new()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_name_with_line_break_cannot_inject_records() {
        let (registry, ingestor) = ingestor();
        let from: SocketAddr = "1.2.3.4:5000".parse().unwrap();
        let payload = encode_report("Evil,10.0.0.1,7777,coop\nTail", 7777, "RGM_MissionMode");

        assert_eq!(ingestor.handle_datagram(from, &payload), Err(Rejection::InvalidName));
        ingestor
            .handle_datagram(from, &encode_report("Honest", 7777, "RGM_MissionMode"))
            .unwrap();

        let restored = Registry::new();
        let summary = restored.load(&registry.save()).unwrap();
        assert_eq!(summary.loaded, 1);
        assert!(summary.skipped.is_empty());
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get(&Hostport::new("1.2.3.4", 7777)).unwrap().name, "Honest");
        assert!(restored.get(&Hostport::new("10.0.0.1", 7777)).is_none());
    }

    #[test]
    fn test_handle_datagram_uses_source_address() {
        let (registry, ingestor) = ingestor();
        let from: SocketAddr = "1.2.3.4:55123".parse().unwrap();
        let payload = encode_report("A", 7777, "RGM_TerroristHuntMode");

        let id = ingestor.handle_datagram(from, &payload).unwrap();
        assert_eq!(id, Hostport::new("1.2.3.4", 7777));
        assert_eq!(registry.get(&id).unwrap().beacon_port, Some(8777));

        let loopback: SocketAddr = "127.0.0.1:55123".parse().unwrap();
        assert!(ingestor.handle_datagram(loopback, &payload).is_err());
        assert!(matches!(
            ingestor.handle_datagram(from, b"junk"),
            Err(Rejection::Undecodable(_))
        ));
    }

    #[tokio::test]
    async fn test_run_registers_events() {
        let (registry, ingestor) = ingestor();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(ingestor, rx, cancel.clone()));

        tx.send(BeaconEvent::Received {
            from: "1.2.3.4:1".parse().unwrap(),
            payload: encode_report("A", 7777, "RGM_MissionMode"),
        })
        .await
        .unwrap();
        tx.send(BeaconEvent::Received {
            from: "10.0.0.1:1".parse().unwrap(),
            payload: encode_report("Private", 7777, "RGM_MissionMode"),
        })
        .await
        .unwrap();

        while registry.is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(registry.len(), 1);
    }
}
