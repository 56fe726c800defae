use super::{wire, TransportError};
use crate::snapshot::ChannelSnapshot;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Host side of the transport
#[derive(Debug)]
pub struct SnapshotSender {
    socket: UdpSocket,
    target: SocketAddr,
    sent: u64,
}

impl SnapshotSender {
    /// Binds an ephemeral local socket of the same family as `target`.
    pub async fn connect(target: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind { addr: local, source })?;
        info!("Sending snapshots to {}", target);
        Ok(Self {
            socket,
            target,
            sent: 0,
        })
    }

    /// Transmits the full snapshot as one datagram. No retry.
    pub async fn send(&mut self, snapshot: &ChannelSnapshot) -> Result<(), TransportError> {
        let bytes = wire::encode(snapshot);
        let sent = self
            .socket
            .send_to(&bytes, self.target)
            .await
            .map_err(TransportError::Send)?;
        if sent != bytes.len() {
            return Err(TransportError::ShortWrite {
                sent,
                expected: bytes.len(),
            });
        }
        self.sent += 1;
        debug!("Sent snapshot #{} {}", self.sent, snapshot);
        Ok(())
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }
}
