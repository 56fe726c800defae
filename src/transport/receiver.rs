use super::{wire, TransportError};
use crate::snapshot::ChannelSnapshot;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{info, trace};

/// Target side of the transport
#[derive(Debug)]
pub struct SnapshotReceiver {
    socket: UdpSocket,
    // one spare byte so oversized datagrams are not silently truncated to fit
    buf: [u8; wire::WIRE_SIZE + 1],
}

impl SnapshotReceiver {
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        info!("Listening for snapshots on {}", addr);
        Ok(Self {
            socket,
            buf: [0u8; wire::WIRE_SIZE + 1],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::Receive)
    }

    /// Waits for the next datagram and decodes it.
    ///
    /// Blocks indefinitely; stale servo positions persist meanwhile.
    pub async fn receive(&mut self) -> Result<ChannelSnapshot, TransportError> {
        let (len, from) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .map_err(TransportError::Receive)?;
        trace!("Received {} bytes from {}", len, from);
        wire::decode(&self.buf[..len]).map_err(|source| TransportError::Malformed { from, source })
    }

    pub async fn receive_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<ChannelSnapshot, TransportError> {
        tokio::time::timeout(timeout, self.receive())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}
