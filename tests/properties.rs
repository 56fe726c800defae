//! Property tests for the snapshot ordering, conversion and wire codec.

use proptest::prelude::*;
use servolink::convert::RangeConverter;
use servolink::snapshot::aggregator::SnapshotAggregator;
use servolink::snapshot::{ChannelId, MAX_CHANNELS};
use servolink::transport::wire;

#[derive(Debug, Clone)]
enum Op {
    Update(u8, i32),
    Release(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..10, -40_000i32..40_000).prop_map(|(c, m)| Op::Update(c, m)),
        1 => (0u8..10).prop_map(Op::Release),
    ]
}

fn channels(n: usize) -> Vec<ChannelId> {
    (0..n as u8).map(ChannelId::new).collect()
}

proptest! {
    /// Whatever sequence of updates and releases arrives, the snapshot keeps
    /// a sorted, unique, contiguous valid prefix.
    #[test]
    fn aggregator_keeps_invariants(
        count in 1usize..=MAX_CHANNELS,
        ops in proptest::collection::vec(op(), 0..64),
    ) {
        let mut aggregator = SnapshotAggregator::new(channels(count)).unwrap();
        for op in ops {
            match op {
                Op::Update(c, m) => {
                    let known = aggregator.snapshot().magnitude_of(ChannelId::new(c)).is_some();
                    prop_assert_eq!(aggregator.apply_update(ChannelId::new(c), m), known);
                    if known {
                        prop_assert_eq!(aggregator.snapshot().magnitude_of(ChannelId::new(c)), Some(m));
                    }
                }
                Op::Release(c) => {
                    aggregator.release(ChannelId::new(c));
                    prop_assert_eq!(aggregator.snapshot().magnitude_of(ChannelId::new(c)), None);
                }
            }
            let snapshot = aggregator.snapshot();
            prop_assert!(snapshot.upholds_invariants());
            prop_assert!(snapshot.active().windows(2).all(|w| w[0].magnitude <= w[1].magnitude));
        }
    }

    #[test]
    fn snapshot_survives_the_wire(
        magnitudes in proptest::collection::vec(any::<i32>(), 1..=MAX_CHANNELS),
    ) {
        let mut aggregator = SnapshotAggregator::new(channels(magnitudes.len())).unwrap();
        for (c, m) in magnitudes.iter().enumerate() {
            aggregator.apply_update(ChannelId::new(c as u8), *m);
        }
        let bytes = wire::encode(aggregator.snapshot());
        prop_assert_eq!(bytes.len(), wire::WIRE_SIZE);
        prop_assert_eq!(&wire::decode(&bytes).unwrap(), aggregator.snapshot());
    }

    #[test]
    fn default_conversion_is_monotonic(a in any::<i16>(), b in any::<i16>()) {
        let converter = RangeConverter::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(converter.convert(i32::from(lo)) <= converter.convert(i32::from(hi)));
    }

    #[test]
    fn valid_converters_are_monotonic(
        in_min in -100_000.0f64..0.0,
        in_span in 1.0f64..200_000.0,
        out_min in 0.0f64..3_000.0,
        out_span in 0.0f64..3_000.0,
        a in -40_000i32..40_000,
        b in -40_000i32..40_000,
    ) {
        let converter = RangeConverter::new(in_min, in_min + in_span, out_min, out_min + out_span);
        prop_assert!(converter.validate().is_ok());
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(converter.convert(lo) <= converter.convert(hi));
    }
}
