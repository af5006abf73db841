use std::sync::Arc;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use shared::protocol::{
    ADD_SERVER_FORM_PATH, BEACON_PORT_OFFSET, SERVERS_ADD_PATH, SERVERS_ALL_PATH, SERVERS_DEBUG_PATH,
    SERVERS_HASH_PATH, SERVERS_PATH, SERVERS_STATUS_PATH,
};
use shared::types::{GameMode, Health};
use crate::beacon::{decode_report, Prober};
use crate::config::HealthcheckConfig;
use crate::ingest::Ingestor;
use crate::registry::{csv, filter_healthy, Registry};

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub ingestor: Ingestor,
    pub prober: Arc<dyn Prober>,
    pub hash_rx: watch::Receiver<String>,
    pub healthcheck: Arc<HealthcheckConfig>,
}

#[derive(Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub beacon_port: u16,
    pub mode: GameMode,
    pub health: Health,
}

/// Fields posted by the submission form.
#[derive(Debug, Deserialize)]
pub struct AddServerForm {
    pub ip_address: String,
    pub port: String,
}

const ADD_SERVER_FORM: &str = r#"<!DOCTYPE html>
<html>
 <head>
  <title>Add Server</title>
 </head>
 <body>
  <form action="/add-server" method="post">
   <p>
    <label for="ip_address">IP Address:</label>
    <input type="text" id="ip_address" name="ip_address" />
   </p>
   <p>
    <label for="port">Port:</label>
    <input type="text" id="port" name="port" />
   </p>
   <p>
    <button type="submit">Submit</button>
   </p>
  </form>
  <p>The server must answer on its beacon port (game port + 1000) to be listed.</p>
 </body>
</html>
"#;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(SERVERS_PATH, get(get_servers))
        .route(SERVERS_ALL_PATH, get(get_all_servers))
        .route(SERVERS_DEBUG_PATH, get(get_debug_servers))
        .route(SERVERS_HASH_PATH, get(get_hash))
        .route(SERVERS_STATUS_PATH, get(get_status))
        .route(SERVERS_ADD_PATH, post(add_server))
        .route(ADD_SERVER_FORM_PATH, get(add_server_form).post(submit_add_server_form))
        .with_state(state)
}

fn listing(body: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

async fn get_servers(State(state): State<AppState>) -> impl IntoResponse {
    listing(csv::encode(&filter_healthy(&state.registry.snapshot())))
}

async fn get_all_servers(State(state): State<AppState>) -> impl IntoResponse {
    listing(csv::encode(&state.registry.snapshot()))
}

async fn get_debug_servers(State(state): State<AppState>) -> impl IntoResponse {
    listing(csv::encode_debug(&state.registry.snapshot()))
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.hash_rx.borrow().clone()
}

async fn get_status(State(state): State<AppState>) -> Json<Vec<ServerStatus>> {
    let mut servers: Vec<_> = state.registry.snapshot().into_iter().collect();
    servers.sort_by(|(a, _), (b, _)| a.cmp(b));

    Json(
        servers
            .into_iter()
            .map(|(_, s)| ServerStatus {
                beacon_port: s.probe_port(),
                name: s.name,
                ip: s.ip,
                port: s.port,
                mode: s.game_mode,
                health: s.health,
            })
            .collect(),
    )
}

async fn add_server_form() -> Html<&'static str> {
    Html(ADD_SERVER_FORM)
}

async fn submit_add_server_form(
    State(state): State<AppState>,
    Form(form): Form<AddServerForm>,
) -> (StatusCode, String) {
    let hostport = format!("{}:{}", form.ip_address.trim(), form.port.trim());
    add_hostport(&state, &hostport).await
}

async fn add_server(State(state): State<AppState>, body: String) -> (StatusCode, String) {
    add_hostport(&state, &body).await
}

/// Probe a server submitted as `ip:port` and register it if it answers.
async fn add_hostport(state: &AppState, body: &str) -> (StatusCode, String) {
    let (ip, port) = match parse_hostport(body) {
        Ok(hp) => hp,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason.to_string()),
    };

    let timeout = state.healthcheck.timeout();
    let beacon_port = port.saturating_add(BEACON_PORT_OFFSET);
    let data = match state.prober.probe(&ip, beacon_port, timeout).await {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!("Submitted server {}:{} did not answer: {:#}", ip, port, e);
            return (
                StatusCode::BAD_REQUEST,
                "failed to reach new server; ensure ServerBeaconPort is Port+1000 in RavenShield.ini"
                    .to_string(),
            );
        }
    };

    let registered = decode_report(&ip, &data)
        .map_err(Into::into)
        .and_then(|report| state.ingestor.register_report(report));
    match registered {
        Ok(id) => {
            tracing::info!("Added server {} by request", id);
            (StatusCode::OK, "server added successfully".to_string())
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn parse_hostport(body: &str) -> Result<(String, u16), &'static str> {
    let (ip, port) = body
        .trim()
        .rsplit_once(':')
        .ok_or("request body must contain 'ip:port'")?;
    if ip.is_empty() || ip.contains(':') {
        return Err("request body must contain 'ip:port'");
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or("port must be a number")?;
    Ok((ip.to_string(), port))
}
