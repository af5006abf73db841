//! Server list format served to clients and written to checkpoints.
//!
//! One header line followed by `name,ip,port,mode` records. Names are not
//! escaped, so records are split from the right and a comma inside a name
//! survives a round trip. Control characters in names are written as spaces
//! so a name can never span lines.

use std::fmt::Write;
use thiserror::Error;
use shared::protocol::CSV_HEADER;
use shared::types::{GameMode, GameServer, Health, Hostport, ServerMap};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("server list is not valid UTF-8")]
    InvalidUtf8,
}

/// A record that was dropped while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct RecordError {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Decoded {
    pub servers: ServerMap,
    pub skipped: Vec<RecordError>,
}

/// Encode servers as a sorted list without health information.
pub fn encode(servers: &ServerMap) -> Vec<u8> {
    render(servers, false)
}

/// Encode servers with their health counters appended to each record.
pub fn encode_debug(servers: &ServerMap) -> Vec<u8> {
    render(servers, true)
}

fn render(servers: &ServerMap, debug: bool) -> Vec<u8> {
    let mut records: Vec<String> = servers
        .values()
        .map(|s| {
            let name = s.name.replace(|c: char| c.is_control(), " ");
            let mut line = format!("{},{},{},{}", name, s.ip, s.port, s.game_mode);
            if debug {
                let h = &s.health;
                let _ = write!(
                    line,
                    ",healthy={},expired={},passed={},failed={}",
                    h.healthy, h.expired, h.consecutive_passed, h.consecutive_failed
                );
            }
            line
        })
        .collect();
    records.sort();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());
    lines.extend(records);
    lines.join("\n").into_bytes()
}

/// Decode a server list. Malformed records are skipped and reported in
/// [`Decoded::skipped`]; the remaining records are kept. Health is not part
/// of the format, so every decoded server starts from a clean slate.
pub fn decode(data: &[u8]) -> Result<Decoded, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::InvalidUtf8)?;

    let mut decoded = Decoded::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with(CSV_HEADER) {
            continue;
        }

        match decode_record(line) {
            Ok(server) => {
                decoded.servers.insert(server.hostport(), server);
            }
            Err(reason) => decoded.skipped.push(RecordError { line: idx + 1, reason }),
        }
    }

    Ok(decoded)
}

fn decode_record(line: &str) -> Result<GameServer, String> {
    let mut fields = line.rsplitn(4, ',');
    let (Some(mode), Some(port), Some(ip), Some(name)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err("expected 4 fields".to_string());
    };

    let ip = ip.trim();
    if name.is_empty() {
        return Err("empty server name".to_string());
    }
    if ip.is_empty() {
        return Err("empty ip".to_string());
    }

    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| format!("invalid (non-numeric) port {:?}", port))?;
    if port == 0 {
        return Err("port must be nonzero".to_string());
    }

    let game_mode: GameMode = mode.parse().map_err(|e| format!("{}", e))?;

    let hostport = Hostport::new(ip, port);
    Ok(GameServer {
        name: name.to_string(),
        ip: hostport.ip().to_string(),
        port,
        beacon_port: None,
        game_mode,
        health: Health::default(),
    })
}
