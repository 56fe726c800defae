//! Host side: joystick axes in, snapshots out
//!
//! Every accepted axis event updates the aggregator and the complete snapshot
//! is sent straight away. Axes that are not bound to a channel are dropped
//! before they reach the aggregator.

use crate::config::Config;
use crate::controller::{AxisEvent, ControllerHandle, ControllerSettings, InputSource};
use crate::error::LinkError;
use crate::snapshot::aggregator::SnapshotAggregator;
use crate::snapshot::ChannelSnapshot;
use crate::transport::SnapshotSender;
use std::net::{IpAddr, SocketAddr};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Resolves `address` as `ip:port`, a bare IP, `host:port` or a bare host
/// name; bare forms get `default_port`.
pub async fn resolve_target(address: &str, default_port: u16) -> Result<SocketAddr, LinkError> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    let lookup = if address.contains(':') {
        address.to_string()
    } else {
        format!("{address}:{default_port}")
    };
    let mut resolved = tokio::net::lookup_host(lookup.as_str())
        .await
        .map_err(|e| LinkError::Usage(format!("cannot resolve target {address:?}: {e}")))?;
    resolved
        .next()
        .ok_or_else(|| LinkError::Usage(format!("target {address:?} resolved to no address")))
}

/// Turns axis events into transmitted snapshots
#[derive(Debug)]
pub struct HostLink {
    config: Config,
    aggregator: SnapshotAggregator,
    sender: SnapshotSender,
}

impl HostLink {
    pub async fn connect(config: Config, target: SocketAddr) -> Result<Self, LinkError> {
        let aggregator = SnapshotAggregator::new(config.channel_ids())
            .map_err(|e| LinkError::Config(e.into()))?;
        let sender = SnapshotSender::connect(target).await?;
        Ok(Self {
            config,
            aggregator,
            sender,
        })
    }

    pub fn snapshot(&self) -> &ChannelSnapshot {
        self.aggregator.snapshot()
    }

    /// Sends the current snapshot regardless of input.
    pub async fn send_current(&mut self) -> Result<(), LinkError> {
        let snapshot = *self.aggregator.snapshot();
        self.sender.send(&snapshot).await?;
        Ok(())
    }

    /// Applies one axis event. Returns whether a snapshot was sent.
    pub async fn handle_event(&mut self, event: AxisEvent) -> Result<bool, LinkError> {
        let Some(channel) = self.config.channel_for_axis(event.axis) else {
            trace!("Axis {} not bound, dropped", event.axis);
            return Ok(false);
        };
        if !self.aggregator.apply_update(channel, i32::from(event.value)) {
            return Ok(false);
        }
        self.send_current().await?;
        Ok(true)
    }

    /// Forwards events until `cancel` fires or the input ends.
    ///
    /// Only a requested shutdown may release the channels; losing the input
    /// leaves the target holding its last positions.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<AxisEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), LinkError> {
        // the target starts from the registered positions
        self.send_current().await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event).await?;
                    }
                    // the target keeps the last positions
                    None => {
                        warn!("Input source ended after {} snapshots", self.sender.sent_count());
                        return Err(LinkError::ResourceUnavailable(
                            "input source ended".to_string(),
                        ));
                    }
                },
            }
        }
        info!("Host loop stopped after {} snapshots", self.sender.sent_count());

        if self.config.host.release_on_exit {
            match self.sender.send(&ChannelSnapshot::empty()).await {
                Ok(()) => debug!("Released all channels on target"),
                Err(e) => warn!("Failed to release channels: {}", e),
            }
        }
        Ok(())
    }
}

/// Opens the input and target, then runs the host loop.
pub async fn run(
    config: Config,
    joystick: &str,
    address: &str,
    cancel: CancellationToken,
) -> Result<(), LinkError> {
    let target = resolve_target(address, config.host.default_port).await?;
    let settings = ControllerSettings {
        joystick_deadzone: config.host.joystick_deadzone,
        ..ControllerSettings::default()
    };
    let (controller, events) =
        ControllerHandle::spawn(InputSource::from_arg(joystick), settings, &cancel).await?;
    let mut link = HostLink::connect(config, target).await?;

    let result = link.run(events, &cancel).await;
    controller.stop();
    result
}
