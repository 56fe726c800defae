//! Channel snapshot - the data model shared by host and target
//!
//! A snapshot is the complete state of every servo channel at one instant. It
//! has a fixed capacity of [`MAX_CHANNELS`] records and is always handled as a
//! whole: transmitted in full, converted in full and published in full.
//!
//! # Invariants
//!
//! ```text
//! [ (B, -120) (A, 40) (C, 9000) | Invalid Invalid Invalid ... ]
//!   └──── valid prefix, ascending ──┘ └──── sentinel suffix ────┘
//! ```
//!
//! 1. Valid records form a contiguous prefix, `Invalid` records the suffix
//! 2. The valid prefix is sorted ascending by magnitude
//! 3. Channel ids are unique inside the valid prefix
//! 4. The record count never changes
//!
//! The fields are private; a snapshot can only be obtained through
//! [`ChannelSnapshot::empty`], [`ChannelSnapshot::from_records`] or the
//! [`SnapshotAggregator`], so every value in circulation upholds the invariants.

pub mod aggregator;

pub use aggregator::SnapshotAggregator;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of record slots in every snapshot
pub const MAX_CHANNELS: usize = 8;

/// Identifier of one servo channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u8);

impl ChannelId {
    /// First reference channel (joystick X axis)
    pub const A: ChannelId = ChannelId(0);
    /// Second reference channel (joystick Y axis)
    pub const B: ChannelId = ChannelId(1);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ChannelId::A => write!(f, "A"),
            ChannelId::B => write!(f, "B"),
            ChannelId(n) => write!(f, "#{}", n),
        }
    }
}

/// One slot of a snapshot. `channel == None` is the `Invalid` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel: Option<ChannelId>,
    pub magnitude: i32,
}

impl ChannelRecord {
    pub const INVALID: ChannelRecord = ChannelRecord {
        channel: None,
        magnitude: 0,
    };

    pub const fn new(channel: ChannelId, magnitude: i32) -> Self {
        Self {
            channel: Some(channel),
            magnitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.channel.is_some()
    }
}

impl Default for ChannelRecord {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Reasons a record array cannot become a snapshot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("valid record for channel {channel} at slot {slot} follows an invalid slot")]
    Interleaved { slot: usize, channel: ChannelId },

    #[error("channel {0} appears more than once")]
    DuplicateChannel(ChannelId),

    #[error("snapshot has no free slot for channel {0}")]
    Full(ChannelId),
}

/// Fixed-capacity, sorted state of all channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    records: [ChannelRecord; MAX_CHANNELS],
    active: usize,
}

impl ChannelSnapshot {
    /// A snapshot in which every slot is `Invalid`
    pub const fn empty() -> Self {
        Self {
            records: [ChannelRecord::INVALID; MAX_CHANNELS],
            active: 0,
        }
    }

    /// Builds a snapshot from raw records.
    ///
    /// Rejects interleaved sentinels and duplicate ids. A structurally sound
    /// but unsorted prefix is accepted and sorted.
    pub fn from_records(records: [ChannelRecord; MAX_CHANNELS]) -> Result<Self, SnapshotError> {
        let active = records.iter().take_while(|r| r.is_valid()).count();

        if let Some((slot, channel)) = records
            .iter()
            .enumerate()
            .skip(active)
            .find_map(|(slot, r)| r.channel.map(|channel| (slot, channel)))
        {
            return Err(SnapshotError::Interleaved { slot, channel });
        }

        let ids = records[..active].iter().filter_map(|r| r.channel);
        for (i, channel) in ids.enumerate() {
            if records[..i].iter().any(|r| r.channel == Some(channel)) {
                return Err(SnapshotError::DuplicateChannel(channel));
            }
        }

        let mut snapshot = Self { records, active };
        snapshot.sort_prefix();
        Ok(snapshot)
    }

    /// The valid prefix, ascending by magnitude
    pub fn active(&self) -> &[ChannelRecord] {
        &self.records[..self.active]
    }

    /// All slots including the sentinel suffix
    pub fn records(&self) -> &[ChannelRecord; MAX_CHANNELS] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Magnitude of `channel` if it is part of the valid prefix
    pub fn magnitude_of(&self, channel: ChannelId) -> Option<i32> {
        self.active()
            .iter()
            .find(|r| r.channel == Some(channel))
            .map(|r| r.magnitude)
    }

    /// Checks all four invariants. Used by tests and debug assertions.
    pub fn upholds_invariants(&self) -> bool {
        let prefix_ok = self.records[..self.active].iter().all(|r| r.is_valid())
            && self.records[self.active..].iter().all(|r| !r.is_valid());
        let sorted = self
            .active()
            .windows(2)
            .all(|w| w[0].magnitude <= w[1].magnitude);
        let unique = self
            .active()
            .iter()
            .enumerate()
            .all(|(i, r)| !self.active()[..i].iter().any(|o| o.channel == r.channel));
        prefix_ok && sorted && unique
    }

    /// Returns a copy with `f` applied to every valid magnitude, re-sorted.
    pub fn map_magnitudes(&self, mut f: impl FnMut(i32) -> i32) -> Self {
        let mut out = *self;
        for record in &mut out.records[..out.active] {
            record.magnitude = f(record.magnitude);
        }
        out.sort_prefix();
        out
    }

    pub(crate) fn insert(&mut self, channel: ChannelId, magnitude: i32) -> Result<(), SnapshotError> {
        if self.magnitude_of(channel).is_some() {
            return Err(SnapshotError::DuplicateChannel(channel));
        }
        if self.active == MAX_CHANNELS {
            return Err(SnapshotError::Full(channel));
        }
        self.records[self.active] = ChannelRecord::new(channel, magnitude);
        self.active += 1;
        self.sort_prefix();
        Ok(())
    }

    pub(crate) fn set_magnitude(&mut self, channel: ChannelId, magnitude: i32) -> bool {
        let Some(record) = self.records[..self.active]
            .iter_mut()
            .find(|r| r.channel == Some(channel))
        else {
            return false;
        };
        record.magnitude = magnitude;
        self.sort_prefix();
        true
    }

    pub(crate) fn remove(&mut self, channel: ChannelId) -> bool {
        let Some(index) = self.records[..self.active]
            .iter()
            .position(|r| r.channel == Some(channel))
        else {
            return false;
        };
        // shift the tail of the prefix forward, keep the order
        self.records.copy_within(index + 1..self.active, index);
        self.active -= 1;
        self.records[self.active] = ChannelRecord::INVALID;
        true
    }

    fn sort_prefix(&mut self) {
        self.records[..self.active].sort_by_key(|r| r.magnitude);
    }
}

impl Default for ChannelSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for ChannelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, record) in self.active().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(channel) = record.channel {
                write!(f, "{}={}", channel, record.magnitude)?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(valid: &[(u8, i32)]) -> [ChannelRecord; MAX_CHANNELS] {
        let mut out = [ChannelRecord::INVALID; MAX_CHANNELS];
        for (slot, (id, magnitude)) in valid.iter().enumerate() {
            out[slot] = ChannelRecord::new(ChannelId::new(*id), *magnitude);
        }
        out
    }

    #[test]
    fn empty_snapshot_is_all_invalid() {
        let snapshot = ChannelSnapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.records().iter().all(|r| !r.is_valid()));
        assert!(snapshot.upholds_invariants());
    }

    #[test]
    fn from_records_sorts_prefix() {
        let snapshot = ChannelSnapshot::from_records(records(&[(0, 500), (1, -10), (2, 30)]))
            .expect("valid records");
        let order: Vec<i32> = snapshot.active().iter().map(|r| r.magnitude).collect();
        assert_eq!(order, vec![-10, 30, 500]);
        assert!(snapshot.upholds_invariants());
    }

    #[test]
    fn from_records_rejects_interleaving() {
        let mut raw = records(&[(0, 1)]);
        raw[2] = ChannelRecord::new(ChannelId::B, 7);
        assert_eq!(
            ChannelSnapshot::from_records(raw),
            Err(SnapshotError::Interleaved {
                slot: 2,
                channel: ChannelId::B
            })
        );
    }

    #[test]
    fn from_records_rejects_duplicates() {
        let raw = records(&[(1, 5), (0, 6), (1, 7)]);
        assert_eq!(
            ChannelSnapshot::from_records(raw),
            Err(SnapshotError::DuplicateChannel(ChannelId::B))
        );
    }

    #[test]
    fn remove_keeps_prefix_contiguous() {
        let mut snapshot =
            ChannelSnapshot::from_records(records(&[(0, 1), (1, 2), (2, 3)])).unwrap();
        assert!(snapshot.remove(ChannelId::B));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.magnitude_of(ChannelId::B), None);
        assert!(snapshot.upholds_invariants());
        assert!(!snapshot.remove(ChannelId::B));
    }

    #[test]
    fn insert_fails_when_full() {
        let mut snapshot = ChannelSnapshot::empty();
        for id in 0..MAX_CHANNELS as u8 {
            snapshot.insert(ChannelId::new(id), 0).unwrap();
        }
        let extra = ChannelId::new(MAX_CHANNELS as u8);
        assert_eq!(snapshot.insert(extra, 0), Err(SnapshotError::Full(extra)));
    }

    #[test]
    fn display_lists_valid_prefix() {
        let snapshot = ChannelSnapshot::from_records(records(&[(1, 2000), (0, 1250)])).unwrap();
        assert_eq!(snapshot.to_string(), "[A=1250, B=2000]");
    }
}
