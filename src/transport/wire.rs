//! Fixed-size wire format for a full snapshot
//!
//! ```text
//! slot 0                      slot 1                      ... slot MAX_CHANNELS-1
//! ┌────────────┬────────────┐ ┌────────────┬────────────┐
//! │ channel i32│magnitude i32│ │ channel i32│magnitude i32│ ...
//! └────────────┴────────────┘ └────────────┴────────────┘
//! ```
//!
//! Little-endian, no header, no checksum. `channel == -1` marks an `Invalid`
//! slot. Every message is exactly [`WIRE_SIZE`] bytes.

use crate::snapshot::{ChannelId, ChannelRecord, ChannelSnapshot, SnapshotError, MAX_CHANNELS};

/// Bytes per record
pub const RECORD_SIZE: usize = 8;

/// Bytes per message
pub const WIRE_SIZE: usize = MAX_CHANNELS * RECORD_SIZE;

const INVALID_CHANNEL: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("message is {actual} bytes, expected {expected}")]
    WrongLength { actual: usize, expected: usize },

    #[error("slot {slot} carries unknown channel id {raw}")]
    InvalidChannel { slot: usize, raw: i32 },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub fn encode(snapshot: &ChannelSnapshot) -> [u8; WIRE_SIZE] {
    let mut buf = [0u8; WIRE_SIZE];
    for (record, chunk) in snapshot
        .records()
        .iter()
        .zip(buf.chunks_exact_mut(RECORD_SIZE))
    {
        let channel = record
            .channel
            .map_or(INVALID_CHANNEL, |c| i32::from(c.raw()));
        chunk[..4].copy_from_slice(&channel.to_le_bytes());
        chunk[4..].copy_from_slice(&record.magnitude.to_le_bytes());
    }
    buf
}

/// Parses one complete message. Anything but exactly [`WIRE_SIZE`] bytes is
/// rejected before a single record is read.
pub fn decode(bytes: &[u8]) -> Result<ChannelSnapshot, WireError> {
    if bytes.len() != WIRE_SIZE {
        return Err(WireError::WrongLength {
            actual: bytes.len(),
            expected: WIRE_SIZE,
        });
    }

    let mut records = [ChannelRecord::INVALID; MAX_CHANNELS];
    for (slot, chunk) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
        let raw = read_i32(&chunk[..4]);
        let magnitude = read_i32(&chunk[4..]);
        records[slot] = match raw {
            INVALID_CHANNEL => ChannelRecord::INVALID,
            id => {
                let id = u8::try_from(id).map_err(|_| WireError::InvalidChannel { slot, raw })?;
                ChannelRecord::new(ChannelId::new(id), magnitude)
            }
        };
    }

    Ok(ChannelSnapshot::from_records(records)?)
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    i32::from_le_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotAggregator;

    #[test]
    fn empty_snapshot_encodes_sentinels() {
        let bytes = encode(&ChannelSnapshot::empty());
        assert_eq!(bytes.len(), WIRE_SIZE);
        for chunk in bytes.chunks_exact(RECORD_SIZE) {
            assert_eq!(&chunk[..4], &(-1i32).to_le_bytes());
        }
    }

    #[test]
    fn reference_layout() {
        let mut aggregator = SnapshotAggregator::new([ChannelId::A, ChannelId::B]).unwrap();
        aggregator.apply_update(ChannelId::A, 2000);
        aggregator.apply_update(ChannelId::B, 1250);

        let bytes = encode(aggregator.snapshot());
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1250i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2000i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &(-1i32).to_le_bytes());
    }

    #[test]
    fn decode_round_trips() {
        let mut aggregator = SnapshotAggregator::new([ChannelId::A, ChannelId::B]).unwrap();
        aggregator.apply_update(ChannelId::A, -17);
        aggregator.apply_update(ChannelId::B, 32767);
        let snapshot = *aggregator.snapshot();
        assert_eq!(decode(&encode(&snapshot)), Ok(snapshot));
    }

    #[test]
    fn short_and_long_messages_are_rejected() {
        let bytes = encode(&ChannelSnapshot::empty());
        assert_eq!(
            decode(&bytes[..WIRE_SIZE - 1]),
            Err(WireError::WrongLength {
                actual: WIRE_SIZE - 1,
                expected: WIRE_SIZE
            })
        );

        let mut long = bytes.to_vec();
        long.push(0);
        assert!(matches!(
            decode(&long),
            Err(WireError::WrongLength { actual, .. }) if actual == WIRE_SIZE + 1
        ));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn unknown_negative_id_is_rejected() {
        let mut bytes = encode(&ChannelSnapshot::empty());
        bytes[..4].copy_from_slice(&(-7i32).to_le_bytes());
        assert_eq!(
            decode(&bytes),
            Err(WireError::InvalidChannel { slot: 0, raw: -7 })
        );
    }

    #[test]
    fn interleaved_sentinel_is_rejected() {
        let mut bytes = encode(&ChannelSnapshot::empty());
        // slot 1 valid while slot 0 is invalid
        bytes[8..12].copy_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(WireError::Snapshot(SnapshotError::Interleaved { slot: 1, .. }))
        ));
    }

    #[test]
    fn unsorted_prefix_is_sorted_on_decode() {
        let mut bytes = encode(&ChannelSnapshot::empty());
        bytes[0..4].copy_from_slice(&0i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&900i32.to_le_bytes());
        bytes[8..12].copy_from_slice(&1i32.to_le_bytes());
        bytes[12..16].copy_from_slice(&100i32.to_le_bytes());

        let snapshot = decode(&bytes).unwrap();
        assert_eq!(snapshot.active()[0].channel, Some(ChannelId::B));
        assert!(snapshot.upholds_invariants());
    }
}
