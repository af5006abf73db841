use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::RegistryConfig;
use crate::registry::Registry;

/// Populate the registry at startup.
///
/// The checkpoint is preferred so a restart picks up where it left off; the
/// seed list is the fallback. If neither can be used the registry starts
/// empty. Returns the number of servers loaded.
pub async fn load_initial(registry: &Registry, config: &RegistryConfig) -> usize {
    for path in [&config.checkpoint_path, &config.seed_path] {
        match load_file(registry, path).await {
            Ok(count) => {
                tracing::info!("Loaded {} servers from {}", count, path.display());
                return count;
            }
            Err(e) => {
                tracing::warn!("Unable to load servers from {}: {:#}", path.display(), e);
            }
        }
    }

    tracing::warn!("No checkpoint or seed list available, starting with an empty registry");
    0
}

async fn load_file(registry: &Registry, path: &Path) -> Result<usize> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let summary = registry
        .load(&data)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    for skipped in &summary.skipped {
        tracing::warn!("Skipped record in {}: {}", path.display(), skipped);
    }
    Ok(summary.loaded)
}

/// Write a snapshot of the registry to `path`.
///
/// The snapshot is written to a sibling temp file and renamed into place,
/// so readers never see a partial checkpoint.
pub async fn write_checkpoint(registry: &Registry, path: &Path) -> Result<()> {
    let data = registry.save();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, &data)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move checkpoint into place at {}", path.display()))?;

    Ok(())
}

/// Checkpoint loop - periodic writes, plus a final one on shutdown.
pub async fn run(
    registry: Registry,
    config: RegistryConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let period = Duration::from_secs(config.checkpoint_interval_secs);
    // Skip the immediate first tick; the registry was just loaded
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match write_checkpoint(&registry, &config.checkpoint_path).await {
                    Ok(()) => tracing::debug!(
                        "Saved {} servers to {}",
                        registry.len(),
                        config.checkpoint_path.display()
                    ),
                    Err(e) => tracing::error!("Failed to save checkpoint: {:#}", e),
                }
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }

    write_checkpoint(&registry, &config.checkpoint_path).await?;
    tracing::info!("Saved final checkpoint with {} servers", registry.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use shared::types::{GameMode, GameServer, Health, Hostport};

    fn config(dir: &Path) -> RegistryConfig {
        RegistryConfig {
            seed_path: dir.join("seed.csv"),
            checkpoint_path: dir.join("checkpoint.csv"),
            checkpoint_interval_secs: 300,
        }
    }

    fn server(name: &str, port: u16) -> GameServer {
        GameServer {
            name: name.to_string(),
            ip: "1.2.3.4".to_string(),
            port,
            beacon_port: None,
            game_mode: GameMode::Cooperative,
            health: Health::registered(),
        }
    }

    #[tokio::test]
    async fn test_prefers_checkpoint_over_seed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.checkpoint_path, "name,ip,port,mode\nCheckpoint,1.2.3.4,7777,coop").unwrap();
        std::fs::write(&config.seed_path, "name,ip,port,mode\nSeed,5.6.7.8,7777,adv").unwrap();

        let registry = Registry::new();
        assert_eq!(load_initial(&registry, &config).await, 1);
        assert!(registry.get(&Hostport::new("1.2.3.4", 7777)).is_some());
    }

    #[tokio::test]
    async fn test_falls_back_to_seed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.seed_path, "name,ip,port,mode\nSeed,5.6.7.8,7777,adv").unwrap();

        let registry = Registry::new();
        assert_eq!(load_initial(&registry, &config).await, 1);
        let seed = registry.get(&Hostport::new("5.6.7.8", 7777)).unwrap();
        assert!(!seed.health.healthy, "Loaded servers must pass a check before listing");
    }

    #[tokio::test]
    async fn test_missing_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        assert_eq!(load_initial(&registry, &config(dir.path())).await, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.checkpoint_path = dir.path().join("nested").join("checkpoint.csv");

        let registry = Registry::new();
        for s in [server("A", 7777), server("B", 7778)] {
            registry.upsert(s.hostport(), s);
        }
        write_checkpoint(&registry, &config.checkpoint_path).await.unwrap();

        let restored = Registry::new();
        assert_eq!(load_initial(&restored, &config).await, 2);
        assert_eq!(restored.get(&Hostport::new("1.2.3.4", 7778)).unwrap().name, "B");
        assert!(!PathBuf::from(format!("{}.tmp", config.checkpoint_path.display())).exists());
    }

    #[tokio::test]
    async fn test_run_writes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let registry = Registry::new();
        let s = server("A", 7777);
        registry.upsert(s.hostport(), s);

        let cancel = CancellationToken::new();
        cancel.cancel();
        run(registry, config.clone(), cancel).await.unwrap();

        let text = std::fs::read_to_string(&config.checkpoint_path).unwrap();
        assert_eq!(text, "name,ip,port,mode\nA,1.2.3.4,7777,coop");
    }
}
