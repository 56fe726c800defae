//! # Snapshot Transport
//!
//! Carries complete snapshots from host to target over UDP.
//!
//! ```text
//! transport/
//! ├── wire.rs      - fixed-size record array codec
//! ├── sender.rs    - host side, one datagram per snapshot
//! └── receiver.rs  - target side, length-checked receive
//! ```
//!
//! Delivery is at-most-once and unordered. There are no acknowledgements,
//! retransmissions or sequence numbers: every datagram holds the full state,
//! so the newest one that arrives simply replaces whatever came before. A lost
//! datagram leaves the servos where they are until the next one arrives.

pub mod receiver;
pub mod sender;
pub mod wire;

pub use receiver::SnapshotReceiver;
pub use sender::SnapshotSender;
pub use wire::{decode, encode, WireError, WIRE_SIZE};

use crate::snapshot::ChannelSnapshot;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// Default UDP port the target listens on
pub const DEFAULT_PORT: u16 = 9930;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket could not be created or bound
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A send did not put the whole snapshot on the wire
    #[error("sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// The receive call itself failed
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// A datagram arrived but is not a valid snapshot
    #[error("malformed message from {from}: {source}")]
    Malformed {
        from: SocketAddr,
        #[source]
        source: WireError,
    },

    #[error("no message within {0:?}")]
    Timeout(std::time::Duration),
}

/// Anything the target loop can pull snapshots from
pub trait SnapshotSource: Send {
    fn receive(
        &mut self,
    ) -> impl Future<Output = Result<ChannelSnapshot, TransportError>> + Send;
}

impl SnapshotSource for SnapshotReceiver {
    fn receive(
        &mut self,
    ) -> impl Future<Output = Result<ChannelSnapshot, TransportError>> + Send {
        SnapshotReceiver::receive(self)
    }
}

impl TransportError {
    /// Send-side failures terminate the host loop
    pub fn is_transmission_failure(&self) -> bool {
        matches!(self, Self::ShortWrite { .. } | Self::Send(_))
    }
}
