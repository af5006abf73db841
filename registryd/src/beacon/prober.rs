use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::{lookup_host, UdpSocket};
use shared::protocol::REPORT_QUERY;

/// Sends a status query to a server's beacon port and returns the raw reply.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, ip: &str, port: u16, timeout: Duration) -> Result<Vec<u8>>;
}

/// Probes servers over UDP from an ephemeral socket per request.
#[derive(Debug, Clone, Default)]
pub struct UdpProber;

const MAX_REPORT_SIZE: usize = 4096;

#[async_trait]
impl Prober for UdpProber {
    async fn probe(&self, ip: &str, port: u16, timeout: Duration) -> Result<Vec<u8>> {
        tokio::time::timeout(timeout, query_report(ip, port))
            .await
            .with_context(|| format!("No report from {}:{} within {:?}", ip, port, timeout))?
    }
}

async fn query_report(ip: &str, port: u16) -> Result<Vec<u8>> {
    let target: SocketAddr = lookup_host((ip, port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", ip, port))?
        .next()
        .with_context(|| format!("No address for {}:{}", ip, port))?;

    let bind: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind)
        .await
        .context("Failed to bind probe socket")?;
    socket
        .connect(target)
        .await
        .with_context(|| format!("Failed to connect probe socket to {}", target))?;
    socket
        .send(REPORT_QUERY)
        .await
        .with_context(|| format!("Failed to send report query to {}", target))?;

    let mut buf = vec![0u8; MAX_REPORT_SIZE];
    let n = socket
        .recv(&mut buf)
        .await
        .with_context(|| format!("Failed to receive report from {}", target))?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_receives_reply() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, from) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], REPORT_QUERY);
            server.send_to(b"report", from).await.unwrap();
        });

        let reply = UdpProber
            .probe("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(reply, b"report");
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        // Bound but silent
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();

        let result = UdpProber
            .probe("127.0.0.1", port, Duration::from_millis(100))
            .await;
        assert!(result.is_err());
        drop(silent);
    }
}
