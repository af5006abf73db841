use thiserror::Error;

/// Separator preceding every field of a server report ('¶' in Latin-1).
const FIELD_MARKER: u8 = 0xB6;
/// Lead byte when the marker arrives UTF-8 encoded.
const UTF8_LEAD: u8 = 0xC2;

const KEY_SERVER_NAME: &str = "I1";
const KEY_GAME_PORT: &str = "P1";
const KEY_CURRENT_MODE: &str = "F1";
const KEY_BEACON_PORT: &str = "H1";

/// Status report decoded from a server beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Raw mode class name, e.g. "RGM_TerroristHuntMode"
    pub mode: String,
    pub beacon_port: Option<u16>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeaconError {
    #[error("empty report")]
    Empty,
    #[error("report has no {0} field")]
    MissingField(&'static str),
    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Decode a raw beacon payload received from `ip`.
///
/// Only the port is mandatory here; callers decide whether an empty name or
/// an unknown mode is acceptable.
pub fn decode_report(ip: &str, data: &[u8]) -> Result<Report, BeaconError> {
    if data.is_empty() {
        return Err(BeaconError::Empty);
    }

    let mut name = String::new();
    let mut mode = String::new();
    let mut port = None;
    let mut beacon_port = None;

    for field in data.split(|b| *b == FIELD_MARKER).skip(1) {
        let field = field.strip_suffix(&[UTF8_LEAD]).unwrap_or(field);
        let field = String::from_utf8_lossy(field);
        let field = field.trim_end_matches(['\0', '\r', '\n']);

        let (key, value) = field.split_once(' ').unwrap_or((field, ""));
        let value = value.trim();
        match key {
            KEY_SERVER_NAME => name = value.to_string(),
            KEY_CURRENT_MODE => mode = value.to_string(),
            KEY_GAME_PORT => port = Some(parse_port("game port", value)?),
            KEY_BEACON_PORT => beacon_port = Some(parse_port("beacon port", value)?),
            _ => {}
        }
    }

    Ok(Report {
        name,
        ip: ip.to_string(),
        port: port.ok_or(BeaconError::MissingField("game port"))?,
        mode,
        beacon_port,
    })
}

fn parse_port(field: &'static str, value: &str) -> Result<u16, BeaconError> {
    value.parse::<u16>().map_err(|_| BeaconError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
pub(crate) fn encode_report(name: &str, port: u16, mode: &str) -> Vec<u8> {
    format!("rvnshld ¶I1 {} ¶P1 {} ¶F1 {} ¶H1 {}", name, port, mode, port + 1000).into_bytes()
}
