use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::Result;

const MAX_DATAGRAM_SIZE: usize = 4096;

pub enum BeaconEvent {
    Received { from: SocketAddr, payload: Vec<u8> },
}

/// Receive beacons and forward them to the ingestion loop.
pub async fn run_listener(
    socket: UdpSocket,
    tx: mpsc::Sender<BeaconEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!("Listening for beacons on {}", socket.local_addr()?);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((n, from)) => {
                        let event = BeaconEvent::Received { from, payload: buf[..n].to_vec() };
                        if let Err(e) = tx.send(event).await {
                            tracing::error!("Failed to forward beacon from {}: {}", from, e);
                        }
                    }
                    // e.g. ICMP port unreachable surfacing on some platforms
                    Err(e) => {
                        tracing::warn!("Beacon receive error: {}", e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("Beacon listener shutting down");
                break;
            }
        }
    }

    Ok(())
}
