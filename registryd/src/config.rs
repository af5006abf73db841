use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use crate::health::Thresholds;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub healthcheck: HealthcheckConfig,
    #[serde(default)]
    pub beacon: BeaconConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_seed_path")]
    pub seed_path: PathBuf,
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcheckConfig {
    #[serde(default = "default_healthcheck_interval")]
    pub interval_secs: u64,
    /// Values below 3 seconds lose reports from distant servers.
    #[serde(default = "default_healthcheck_timeout")]
    pub timeout_secs: u64,
    /// Consecutive passed checks before an unhealthy server is listed again
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
    /// Consecutive failed checks before a server is hidden
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
    /// Consecutive failed checks before a server is dropped entirely
    #[serde(default = "default_expiry_threshold")]
    pub expiry_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeaconConfig {
    #[serde(default = "default_beacon_listen")]
    pub listen: String,
    /// Extra CIDR ranges whose beacons are ignored, on top of loopback,
    /// private and link-local addresses.
    #[serde(default)]
    pub ignored_networks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_seed_path() -> PathBuf {
    PathBuf::from("seed.csv")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("checkpoint.csv")
}

fn default_checkpoint_interval() -> u64 {
    300
}

fn default_healthcheck_interval() -> u64 {
    30
}

fn default_healthcheck_timeout() -> u64 {
    5
}

fn default_healthy_threshold() -> u32 {
    1
}

fn default_unhealthy_threshold() -> u32 {
    60 // 30 minutes
}

fn default_expiry_threshold() -> u32 {
    5760 // 2 days
}

fn default_beacon_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            seed_path: default_seed_path(),
            checkpoint_path: default_checkpoint_path(),
            checkpoint_interval_secs: default_checkpoint_interval(),
        }
    }
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_healthcheck_interval(),
            timeout_secs: default_healthcheck_timeout(),
            healthy_threshold: default_healthy_threshold(),
            unhealthy_threshold: default_unhealthy_threshold(),
            expiry_threshold: default_expiry_threshold(),
        }
    }
}

impl HealthcheckConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            healthy: self.healthy_threshold,
            unhealthy: self.unhealthy_threshold,
            expiry: self.expiry_threshold,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            listen: default_beacon_listen(),
            ignored_networks: Vec::new(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;

        let hc = &config.healthcheck;
        anyhow::ensure!(hc.interval_secs > 0, "healthcheck.interval_secs must be positive");
        anyhow::ensure!(hc.timeout_secs > 0, "healthcheck.timeout_secs must be positive");
        anyhow::ensure!(hc.healthy_threshold > 0, "healthcheck.healthy_threshold must be positive");
        anyhow::ensure!(
            hc.unhealthy_threshold > 0 && hc.unhealthy_threshold <= hc.expiry_threshold,
            "healthcheck.unhealthy_threshold must be between 1 and expiry_threshold"
        );
        anyhow::ensure!(
            config.registry.checkpoint_interval_secs > 0,
            "registry.checkpoint_interval_secs must be positive"
        );

        Ok(config)
    }
}
