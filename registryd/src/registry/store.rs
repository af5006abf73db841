use std::sync::Arc;
use parking_lot::{RwLock, RwLockWriteGuard};
use tokio::sync::watch;
use shared::types::{GameServer, Hostport, ServerMap};
use crate::registry::csv::{self, DecodeError, RecordError};
use crate::registry::hash;

/// Outcome of replacing the registry from a server list.
#[derive(Debug)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: Vec<RecordError>,
}

/// Shared handle to the in-memory server map.
///
/// Every mutation takes the write lock for the map operation only; nothing
/// awaits while holding it. After a mutation that changes what clients see,
/// the lock is downgraded and the listing hash republished on a watch
/// channel, so readers are not blocked while it is computed.
#[derive(Clone)]
pub struct Registry {
    servers: Arc<RwLock<ServerMap>>,
    hash_tx: Arc<watch::Sender<String>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let servers = ServerMap::new();
        let (hash_tx, _) = watch::channel(hash::compute_hash(&servers));
        Self {
            servers: Arc::new(RwLock::new(servers)),
            hash_tx: Arc::new(hash_tx),
        }
    }

    /// Replace the whole map with a decoded server list. On error the
    /// current contents are left untouched.
    pub fn load(&self, data: &[u8]) -> Result<LoadSummary, DecodeError> {
        let decoded = csv::decode(data)?;
        let loaded = decoded.servers.len();

        let mut servers = self.servers.write();
        *servers = decoded.servers;
        self.publish_hash(servers);

        Ok(LoadSummary { loaded, skipped: decoded.skipped })
    }

    /// Point-in-time copy of every server.
    pub fn snapshot(&self) -> ServerMap {
        self.servers.read().clone()
    }

    /// Serialize a snapshot in the server list format.
    pub fn save(&self) -> Vec<u8> {
        csv::encode(&self.snapshot())
    }

    pub fn get(&self, id: &Hostport) -> Option<GameServer> {
        self.servers.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.servers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    /// Insert or fully replace a server. Returns true if it was not known.
    pub fn upsert(&self, id: Hostport, server: GameServer) -> bool {
        let mut servers = self.servers.write();
        let visible_change = servers
            .get(&id)
            .map_or(true, |previous| !hash::same_listing(previous, &server));
        let added = servers.insert(id, server).is_none();
        if visible_change {
            self.publish_hash(servers);
        }
        added
    }

    /// Remove a server. Removing an unknown server is a no-op.
    pub fn remove(&self, id: &Hostport) -> bool {
        let mut servers = self.servers.write();
        let removed = servers.remove(id).is_some();
        if removed {
            self.publish_hash(servers);
        }
        removed
    }

    /// Commit the result of a healthcheck round in one step.
    ///
    /// `probed` is the snapshot the round started from. A checked server
    /// replaces the current entry only if that entry is unchanged since the
    /// snapshot; servers probed but missing from `checked` have expired and
    /// are dropped under the same condition. Entries registered, refreshed or
    /// removed while the round was running keep that newer state.
    pub fn commit_checked(&self, checked: ServerMap, probed: &ServerMap) {
        let mut servers = self.servers.write();
        servers.retain(|id, current| {
            checked.contains_key(id) || probed.get(id) != Some(&*current)
        });
        for (id, server) in checked {
            if let Some(current) = servers.get_mut(&id) {
                if probed.get(&id) == Some(&*current) {
                    *current = server;
                }
            }
        }
        self.publish_hash(servers);
    }

    pub fn hash_receiver(&self) -> watch::Receiver<String> {
        self.hash_tx.subscribe()
    }

    fn publish_hash(&self, servers: RwLockWriteGuard<'_, ServerMap>) {
        let servers = RwLockWriteGuard::downgrade(servers);
        let hash = hash::compute_hash(&servers);
        self.hash_tx.send_if_modified(|current| {
            if *current == hash {
                return false;
            }
            *current = hash;
            true
        });
    }
}

/// Servers currently marked healthy.
pub fn filter_healthy(servers: &ServerMap) -> ServerMap {
    servers
        .iter()
        .filter(|(_, s)| s.health.healthy)
        .map(|(id, s)| (id.clone(), s.clone()))
        .collect()
}
