//! Snapshot Aggregator - sole mutator of the host-side snapshot
//!
//! The set of controllable channels is fixed when the aggregator is built.
//! Afterwards only magnitudes change; every update re-sorts the valid prefix so
//! the snapshot can be handed to the transport as-is.

use super::{ChannelId, ChannelSnapshot, SnapshotError};
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct SnapshotAggregator {
    snapshot: ChannelSnapshot,
}

impl SnapshotAggregator {
    /// Creates the aggregator and registers `channels` at magnitude 0.
    ///
    /// Fails on duplicate ids or when more channels than slots are requested.
    pub fn new(channels: impl IntoIterator<Item = ChannelId>) -> Result<Self, SnapshotError> {
        let mut snapshot = ChannelSnapshot::empty();
        for channel in channels {
            snapshot.insert(channel, 0)?;
        }
        debug!("Aggregator tracking {} channels", snapshot.len());
        Ok(Self { snapshot })
    }

    /// Overwrites the magnitude of `channel` and re-establishes the ordering.
    ///
    /// Channels that are not part of the valid prefix are ignored and `false`
    /// is returned.
    pub fn apply_update(&mut self, channel: ChannelId, magnitude: i32) -> bool {
        let applied = self.snapshot.set_magnitude(channel, magnitude);
        if applied {
            trace!("Channel {} -> {}", channel, magnitude);
        } else {
            trace!("Ignoring update for untracked channel {}", channel);
        }
        debug_assert!(self.snapshot.upholds_invariants());
        applied
    }

    /// Drops `channel` from the valid prefix so the target stops pulsing it.
    pub fn release(&mut self, channel: ChannelId) -> bool {
        let released = self.snapshot.remove(channel);
        if released {
            debug!("Released channel {}", channel);
        }
        debug_assert!(self.snapshot.upholds_invariants());
        released
    }

    pub fn snapshot(&self) -> &ChannelSnapshot {
        &self.snapshot
    }
}
