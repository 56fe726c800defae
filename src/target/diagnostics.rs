//! Startup wiring self-test
//!
//! Drives every configured channel to one end, the other end, then centre,
//! holding each position for the dwell time. The servos are left holding
//! centre until the first snapshot arrives. Watching them move confirms pin
//! wiring and direction before any network input is accepted.

use super::sink::{ServoSink, SinkError};
use crate::convert::RangeConverter;
use crate::snapshot::aggregator::SnapshotAggregator;
use crate::snapshot::{ChannelId, ChannelSnapshot};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const SWEEP_HIGH: i32 = 32_000;
pub const SWEEP_LOW: i32 = -32_000;
pub const SWEEP_CENTRE: i32 = 0;

/// Raw snapshots of the sweep, in order, before conversion
pub fn sweep_steps(channels: &[ChannelId]) -> Vec<ChannelSnapshot> {
    [SWEEP_HIGH, SWEEP_LOW, SWEEP_CENTRE]
        .into_iter()
        .filter_map(|magnitude| {
            let mut aggregator = SnapshotAggregator::new(channels.iter().copied()).ok()?;
            for &channel in channels {
                aggregator.apply_update(channel, magnitude);
            }
            Some(*aggregator.snapshot())
        })
        .collect()
}

/// Runs the sweep through `sink`. Cancellation cuts the dwell short and
/// leaves the last written position in place.
pub async fn run_sweep<S: ServoSink>(
    sink: &mut S,
    converter: &RangeConverter,
    channels: &[ChannelId],
    dwell: Duration,
    cancel: &CancellationToken,
) -> Result<(), SinkError> {
    info!(
        "Running diagnostics sweep on {} channels ({:?} per position)",
        channels.len(),
        dwell
    );
    for step in sweep_steps(channels) {
        let converted = converter.convert_snapshot(&step);
        info!("Diagnostics position {}", converted);
        sink.write(&converted).await?;

        let interrupted = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(dwell) => false,
        };
        if interrupted {
            info!("Diagnostics interrupted");
            return Ok(());
        }
    }
    info!("Diagnostics sweep finished, channels at centre");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingSink(Vec<ChannelSnapshot>);

    impl ServoSink for CollectingSink {
        async fn write(&mut self, converted: &ChannelSnapshot) -> Result<(), SinkError> {
            self.0.push(*converted);
            Ok(())
        }
    }

    #[test]
    fn steps_cover_both_ends_and_centre() {
        let steps = sweep_steps(&[ChannelId::A, ChannelId::B]);
        let a: Vec<Option<i32>> = steps.iter().map(|s| s.magnitude_of(ChannelId::A)).collect();
        assert_eq!(a, vec![Some(SWEEP_HIGH), Some(SWEEP_LOW), Some(SWEEP_CENTRE)]);
        assert!(steps.iter().all(|s| s.len() == 2));
    }

    #[tokio::test]
    async fn sweep_ends_holding_centre() {
        let converter = RangeConverter::default();
        let mut sink = CollectingSink::default();
        run_sweep(
            &mut sink,
            &converter,
            &[ChannelId::A],
            Duration::from_millis(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let widths: Vec<Option<i32>> = sink.0.iter().map(|s| s.magnitude_of(ChannelId::A)).collect();
        assert_eq!(
            widths,
            vec![
                Some(converter.convert(SWEEP_HIGH)),
                Some(converter.convert(SWEEP_LOW)),
                Some(1250),
            ]
        );
        assert!(sink.0.iter().all(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_after_the_current_position() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = CollectingSink::default();
        run_sweep(
            &mut sink,
            &RangeConverter::default(),
            &[ChannelId::A, ChannelId::B],
            Duration::from_secs(60),
            &cancel,
        )
        .await
        .unwrap();
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].len(), 2);
    }
}
