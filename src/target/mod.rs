//! Target side: receive, convert, pulse
//!
//! ```text
//! UDP ──► SnapshotReceiver ──► RangeConverter ──► OutputSink ──► pins
//!         (tokio control loop, one message at a time)
//! ```
//!
//! Every resource is opened before the loop starts. Inside the loop, bad
//! datagrams and receive errors are logged and skipped so the last good
//! positions stay in effect. Only a failing sink ends the loop early.

pub mod diagnostics;
pub mod sink;

use crate::config::{Config, SinkKind};
use crate::error::LinkError;
use crate::pulse::{
    GpioPins, MonotonicClock, NullPins, PinBank, SchedulerHandle, SchedulerSettings,
    SharedPulseTable,
};
use crate::rate_limit::RateLimiter;
use crate::snapshot::{ChannelId, ChannelSnapshot};
use crate::transport::{SnapshotReceiver, SnapshotSource, TransportError};
use sink::{DeviceFileSink, OutputSink, SchedulerSink, ServoSink};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Opened output stage; keeps the scheduler thread alive while held
pub struct ServoOutput {
    pub sink: OutputSink,
    scheduler: Option<SchedulerHandle>,
}

impl ServoOutput {
    pub async fn open(config: &Config, cancel: &CancellationToken) -> Result<Self, LinkError> {
        let target = &config.target;
        match target.sink {
            SinkKind::Scheduler => {
                let pin_map = config.pin_map();
                let pins: Box<dyn PinBank> = if target.dry_run {
                    info!("Dry run, pin writes are discarded");
                    Box::new(NullPins)
                } else {
                    Box::new(GpioPins::open(pin_map.pins())?)
                };
                let clock = MonotonicClock::new(Duration::from_micros(u64::from(
                    target.spin_margin_us,
                )));
                let table = SharedPulseTable::default();
                let settings = SchedulerSettings {
                    period_us: target.period_us,
                    pins: pin_map.pins(),
                };
                let token = cancel.child_token();
                let handle = SchedulerHandle::spawn(
                    pins,
                    Box::new(clock),
                    table.clone(),
                    settings,
                    token.clone(),
                )
                .map_err(|e| LinkError::resource("scheduler thread", e))?;
                Ok(Self {
                    sink: SchedulerSink::new(table, pin_map, target.max_pulse_us, token).into(),
                    scheduler: Some(handle),
                })
            }
            SinkKind::Device => {
                let sink = DeviceFileSink::open(&target.device_path)
                    .await
                    .map_err(|e| LinkError::resource("servo device", e))?;
                Ok(Self {
                    sink: sink.into(),
                    scheduler: None,
                })
            }
        }
    }

    /// Output stage without a scheduler thread of its own
    pub fn from_sink(sink: impl Into<OutputSink>) -> Self {
        Self {
            sink: sink.into(),
            scheduler: None,
        }
    }

    fn log_stats(&self) {
        if let Some(scheduler) = &self.scheduler {
            let stats = scheduler.stats();
            info!(
                "Scheduler stats: {} cycles, {} overruns, {} ordering violations, max busy {} µs",
                stats.cycles, stats.overruns, stats.ordering_violations, stats.max_busy_us
            );
        }
    }

    /// Releases every channel and stops the scheduler with all pins low.
    pub async fn close(mut self) {
        if let Err(e) = self.sink.write(&ChannelSnapshot::empty()).await {
            debug!("Release on close skipped: {}", e);
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
    }
}

/// Runs the target until `cancel` fires or the sink fails.
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<(), LinkError> {
    let mut receiver = SnapshotReceiver::bind(config.target.bind).await?;
    let mut output = ServoOutput::open(config, &cancel).await?;

    let result = serve(config, &mut receiver, &mut output, &cancel).await;
    output.close().await;
    result
}

/// Receive loop over already opened resources.
pub async fn serve<R: SnapshotSource>(
    config: &Config,
    receiver: &mut R,
    output: &mut ServoOutput,
    cancel: &CancellationToken,
) -> Result<(), LinkError> {
    if config.target.run_diagnostics {
        let channels: Vec<ChannelId> = config.channel_ids().collect();
        diagnostics::run_sweep(
            &mut output.sink,
            &config.converter,
            &channels,
            Duration::from_millis(config.target.diagnostics_dwell_ms),
            cancel,
        )
        .await?;
    }

    let converter = config.converter;
    let mut receive_errors = RateLimiter::new(Duration::from_secs(1));
    let stats_period = Duration::from_secs(config.target.stats_interval_secs.max(1));
    let mut stats_tick =
        tokio::time::interval_at(tokio::time::Instant::now() + stats_period, stats_period);
    let mut applied: u64 = 0;

    info!("Target ready");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown requested after {} snapshots", applied);
                return Ok(());
            }
            _ = stats_tick.tick() => output.log_stats(),
            received = receiver.receive() => match received {
                Ok(snapshot) => {
                    let converted = converter.convert_snapshot(&snapshot);
                    debug!("Applying {}", converted);
                    output.sink.write(&converted).await?;
                    applied += 1;
                }
                Err(e @ TransportError::Malformed { .. }) => {
                    warn!("Rejected datagram: {}", e);
                }
                Err(e) => {
                    if let Some(suppressed) = receive_errors.check() {
                        error!("Receive failed: {} ({} similar errors suppressed)", e, suppressed);
                    }
                }
            },
        }
    }
}
