//! Controller Handle - starts whichever input source the host was given
//!
//! ```text
//! /dev/input/jsN ──► JoystickDevice (tokio task)   ─┐
//!                                                    ├─[AxisEvent]→ host loop
//! gamepad name   ──► EventCollector (OS thread)     ─┘  (mpsc::channel)
//! ```
//!
//! Opening the source happens before `spawn` returns, so a missing joystick
//! is reported at startup rather than from inside a task.

use super::event_collector::{CollectorSettings, EventCollector};
use super::joystick_device::JoystickDevice;
use super::{AxisEvent, InputError};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Where axis values come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Raw kernel joystick device
    Device(PathBuf),
    /// gilrs gamepad selected by (part of) its name
    Gamepad(String),
}

impl InputSource {
    /// An argument naming an existing path is a device, anything else a
    /// gamepad name.
    pub fn from_arg(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.exists() {
            Self::Device(path.to_path_buf())
        } else {
            Self::Gamepad(arg.to_string())
        }
    }
}

#[derive(Clone, Debug)]
pub struct ControllerSettings {
    /// Only applied to gilrs gamepads; raw devices deliver kernel values
    pub joystick_deadzone: f32,
    pub channel_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.0,
            channel_capacity: 1000,
        }
    }
}

/// Running input source
#[derive(Debug)]
pub struct ControllerHandle {
    source: InputSource,
    cancel: CancellationToken,
}

impl ControllerHandle {
    /// Opens `source` and starts forwarding its axis events. The returned
    /// receiver closes when the source ends.
    ///
    /// The reader runs under a child of `cancel`, so [`stop`](Self::stop)
    /// ends only this source.
    pub async fn spawn(
        source: InputSource,
        settings: ControllerSettings,
        cancel: &CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<AxisEvent>), InputError> {
        info!("Starting input source {:?}", source);
        let cancel = cancel.child_token();
        let (sender, receiver) = mpsc::channel(settings.channel_capacity);

        match &source {
            InputSource::Device(path) => {
                let device = JoystickDevice::open(path).await?;
                let token = cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = device.run(sender, token).await {
                        error!("Joystick reader terminated: {}", e);
                    }
                });
            }
            InputSource::Gamepad(name) => {
                let collector_settings = CollectorSettings {
                    joystick_deadzone: settings.joystick_deadzone,
                };
                let mut collector =
                    EventCollector::create(Some(collector_settings), sender)?.initialize(name)?;
                let token = cancel.clone();
                std::thread::Builder::new()
                    .name("gamepad-collector".into())
                    .spawn(move || {
                        if let Err(e) = collector.run_collection_loop(&token) {
                            error!("Collector terminated with error: {}", e);
                        }
                    })
                    .map_err(|e| InputError::Gamepad(e.to_string()))?;
            }
        }

        info!("Input source running");
        Ok((Self { source, cancel }, receiver))
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_path_is_a_device() {
        let dir = std::env::temp_dir();
        let arg = dir.to_string_lossy().into_owned();
        assert_eq!(InputSource::from_arg(&arg), InputSource::Device(dir));
        assert_eq!(
            InputSource::from_arg("Xbox Wireless"),
            InputSource::Gamepad("Xbox Wireless".into())
        );
    }

    #[tokio::test]
    async fn stop_leaves_the_process_token_alone() {
        let path = std::env::temp_dir().join(format!("servolink-handle-{}", std::process::id()));
        // a single axis 0 event
        let mut event = [0u8; 8];
        event[4..6].copy_from_slice(&300i16.to_ne_bytes());
        event[6] = 0x02;
        tokio::fs::write(&path, event).await.unwrap();

        let process = CancellationToken::new();
        let (handle, mut events) = ControllerHandle::spawn(
            InputSource::Device(path.clone()),
            ControllerSettings::default(),
            &process,
        )
        .await
        .unwrap();
        let first = events.recv().await.unwrap();
        assert_eq!((first.axis, first.value), (0, 300));

        handle.stop();
        assert!(!process.is_cancelled());
        assert!(events.recv().await.is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn process_shutdown_reaches_the_reader() {
        let process = CancellationToken::new();
        let path = std::env::temp_dir().join(format!("servolink-parent-{}", std::process::id()));
        tokio::fs::write(&path, []).await.unwrap();
        let (handle, _events) = ControllerHandle::spawn(
            InputSource::Device(path.clone()),
            ControllerSettings::default(),
            &process,
        )
        .await
        .unwrap();
        process.cancel();
        assert!(handle.cancel.is_cancelled());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
