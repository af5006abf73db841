use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::game_modes;
use crate::protocol::BEACON_PORT_OFFSET;

/// Unique server identity derived from an address and game port.
///
/// The ip is kept in canonical textual form when it parses as an address, so
/// `"1.2.3.4"` and `" 1.2.3.4 "` key the same server. Fields are only set
/// through [`Hostport::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Hostport {
    ip: String,
    port: u16,
}

impl Hostport {
    pub fn new(ip: &str, port: u16) -> Self {
        let trimmed = ip.trim();
        let ip = match trimmed.parse::<IpAddr>() {
            Ok(addr) => addr.to_string(),
            Err(_) => trimmed.to_string(),
        };
        Self { ip, port }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Hostport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Client-facing classification of a game mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    #[serde(rename = "adv")]
    Adversarial,
    #[serde(rename = "coop")]
    Cooperative,
}

impl GameMode {
    /// Classify a mode class name reported by a server, e.g. "RGM_BombAdvMode".
    pub fn from_mode_name(name: &str) -> Option<Self> {
        game_modes::classify(name.trim())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Adversarial => "adv",
            GameMode::Cooperative => "coop",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGameMode(pub String);

impl fmt::Display for UnknownGameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown game mode: {:?}", self.0)
    }
}

impl std::error::Error for UnknownGameMode {}

impl FromStr for GameMode {
    type Err = UnknownGameMode;

    /// Accepts the short wire names as well as raw mode class names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "adv" => Ok(GameMode::Adversarial),
            "coop" => Ok(GameMode::Cooperative),
            other => GameMode::from_mode_name(other)
                .ok_or_else(|| UnknownGameMode(other.to_string())),
        }
    }
}

/// Health-check bookkeeping for a single server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    /// Never cleared once set; an expired server is removed, not revived.
    pub expired: bool,
    pub consecutive_passed: u32,
    pub consecutive_failed: u32,
    pub last_parse_failed: bool,
    pub last_passed: Option<DateTime<Utc>>,
}

impl Health {
    /// Health of a server that has just announced itself. The announcement
    /// counts as one passed check.
    pub fn registered() -> Self {
        Self {
            healthy: true,
            expired: false,
            consecutive_passed: 1,
            consecutive_failed: 0,
            last_parse_failed: false,
            last_passed: Some(Utc::now()),
        }
    }
}

/// A tracked game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServer {
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Port answering beacon queries, when the server told us.
    pub beacon_port: Option<u16>,
    pub game_mode: GameMode,
    pub health: Health,
}

impl GameServer {
    pub fn hostport(&self) -> Hostport {
        Hostport::new(&self.ip, self.port)
    }

    /// Port to send health probes to. Servers are expected to run their
    /// beacon on the game port plus 1000 unless they report otherwise.
    pub fn probe_port(&self) -> u16 {
        self.beacon_port
            .unwrap_or_else(|| self.port.saturating_add(BEACON_PORT_OFFSET))
    }
}

pub type ServerMap = HashMap<Hostport, GameServer>;

/// Whether a reported name can be listed. Line breaks and other control
/// characters would split a record in the server list.
pub fn is_listable_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.chars().any(char::is_control)
}
