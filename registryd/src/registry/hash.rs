use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{GameMode, GameServer, Hostport, ServerMap};

/// Hash only what a client can see; health counters change on every
/// healthcheck without changing the listing.
#[derive(Serialize, PartialEq)]
struct HashView<'a> {
    name: &'a str,
    ip: &'a str,
    port: u16,
    mode: GameMode,
    healthy: bool,
}

impl<'a> From<&'a GameServer> for HashView<'a> {
    fn from(s: &'a GameServer) -> Self {
        HashView {
            name: &s.name,
            ip: &s.ip,
            port: s.port,
            mode: s.game_mode,
            healthy: s.health.healthy,
        }
    }
}

/// Whether two entries look the same to a client.
pub fn same_listing(a: &GameServer, b: &GameServer) -> bool {
    HashView::from(a) == HashView::from(b)
}

/// Computes a SHA-256 hash of the server list.
/// Servers are sorted by hostport for deterministic output.
pub fn compute_hash(servers: &ServerMap) -> String {
    let mut ids: Vec<&Hostport> = servers.keys().collect();
    ids.sort();

    let views: Vec<HashView<'_>> = ids
        .into_iter()
        .map(|id| HashView::from(&servers[id]))
        .collect();

    // Serializing borrowed strings and plain values cannot fail
    let json = serde_json::to_vec(&views).unwrap_or_default();

    let hash = Sha256::digest(&json);
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::{GameServer, Health};

    fn test_server(name: &str, ip: &str) -> GameServer {
        GameServer {
            name: name.to_string(),
            ip: ip.to_string(),
            port: 7777,
            beacon_port: None,
            game_mode: GameMode::Cooperative,
            health: Health::registered(),
        }
    }

    fn map(servers: &[GameServer]) -> ServerMap {
        servers.iter().map(|s| (s.hostport(), s.clone())).collect()
    }

    #[test]
    fn test_hash_deterministic() {
        let a = test_server("a", "1.1.1.1");
        let b = test_server("b", "2.2.2.2");

        let hash1 = compute_hash(&map(&[a.clone(), b.clone()]));
        let hash2 = compute_hash(&map(&[b, a]));

        assert_eq!(hash1, hash2, "Hash should be same regardless of input order");
    }

    #[test]
    fn test_hash_changes_on_visibility() {
        let a = test_server("a", "1.1.1.1");
        let mut hidden = a.clone();
        hidden.health.healthy = false;

        assert_ne!(compute_hash(&map(&[a])), compute_hash(&map(&[hidden])));
    }

    #[test]
    fn test_hash_stable_across_counter_changes() {
        let a = test_server("a", "1.1.1.1");
        let mut b = a.clone();
        b.health.consecutive_passed = 40;
        b.health.last_passed = None;

        assert!(same_listing(&a, &b));
        assert_eq!(compute_hash(&map(&[a])), compute_hash(&map(&[b])));
    }

    #[test]
    fn test_same_listing_sees_rename() {
        let a = test_server("a", "1.1.1.1");
        let renamed = test_server("b", "1.1.1.1");
        assert!(!same_listing(&a, &renamed));
    }
}
