//! Raw Linux joystick reader (`/dev/input/jsN`)
//!
//! The kernel joystick API delivers fixed 8-byte events:
//!
//! ```text
//! offset 0  u32  timestamp (ms)
//! offset 4  i16  value
//! offset 6  u8   type   (0x01 button, 0x02 axis, 0x80 init flag)
//! offset 7  u8   number (axis or button index)
//! ```
//!
//! Values use the host byte order. Only axis events are forwarded; the
//! synthetic init events sent on open carry each axis' current position and
//! are forwarded too.

use super::{AxisEvent, InputError};
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub const JS_EVENT_SIZE: usize = 8;
pub const JS_EVENT_BUTTON: u8 = 0x01;
pub const JS_EVENT_AXIS: u8 = 0x02;
pub const JS_EVENT_INIT: u8 = 0x80;

/// One decoded `js_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    pub time_ms: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    pub fn from_bytes(bytes: [u8; JS_EVENT_SIZE]) -> Self {
        Self {
            time_ms: u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            value: i16::from_ne_bytes([bytes[4], bytes[5]]),
            kind: bytes[6],
            number: bytes[7],
        }
    }

    pub fn is_axis(&self) -> bool {
        self.kind & JS_EVENT_AXIS != 0
    }

    pub fn is_init(&self) -> bool {
        self.kind & JS_EVENT_INIT != 0
    }

    pub fn to_axis_event(self) -> Option<AxisEvent> {
        self.is_axis().then(|| AxisEvent {
            axis: self.number,
            value: self.value,
            timestamp: Local::now(),
        })
    }
}

#[derive(Debug)]
pub struct JoystickDevice {
    file: tokio::fs::File,
    path: PathBuf,
}

impl JoystickDevice {
    pub async fn open(path: &Path) -> Result<Self, InputError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| InputError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Opened joystick device {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next complete event. A closed device is [`InputError::Closed`].
    pub async fn next_event(&mut self) -> Result<JsEvent, InputError> {
        let mut buf = [0u8; JS_EVENT_SIZE];
        match self.file.read_exact(&mut buf).await {
            Ok(_) => Ok(JsEvent::from_bytes(buf)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(InputError::Closed),
            Err(e) => Err(InputError::Read(e)),
        }
    }

    /// Forwards axis events into `sender` until the device closes, the
    /// receiver goes away or `cancel` fires.
    pub async fn run(
        mut self,
        sender: mpsc::Sender<AxisEvent>,
        cancel: CancellationToken,
    ) -> Result<(), InputError> {
        let mut forwarded: u64 = 0;
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.next_event() => event?,
            };
            trace!("js event {:?}", event);

            let Some(axis_event) = event.to_axis_event() else {
                continue;
            };
            if event.is_init() {
                debug!("Initial position axis {} = {}", event.number, event.value);
            }
            if sender.send(axis_event).await.is_err() {
                warn!("Axis event receiver dropped, stopping joystick reader");
                return Err(InputError::Closed);
            }
            forwarded += 1;
        }
        info!(
            "Joystick reader on {} stopped after {} axis events",
            self.path.display(),
            forwarded
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(time_ms: u32, value: i16, kind: u8, number: u8) -> [u8; JS_EVENT_SIZE] {
        let mut bytes = [0u8; JS_EVENT_SIZE];
        bytes[..4].copy_from_slice(&time_ms.to_ne_bytes());
        bytes[4..6].copy_from_slice(&value.to_ne_bytes());
        bytes[6] = kind;
        bytes[7] = number;
        bytes
    }

    #[test]
    fn decodes_axis_event() {
        let event = JsEvent::from_bytes(raw(1234, -32768, JS_EVENT_AXIS, 1));
        assert_eq!(
            event,
            JsEvent {
                time_ms: 1234,
                value: -32768,
                kind: JS_EVENT_AXIS,
                number: 1
            }
        );
        let axis = event.to_axis_event().unwrap();
        assert_eq!((axis.axis, axis.value), (1, -32768));
    }

    #[test]
    fn init_axis_events_are_kept_buttons_dropped() {
        let init = JsEvent::from_bytes(raw(0, 500, JS_EVENT_AXIS | JS_EVENT_INIT, 0));
        assert!(init.is_init());
        assert!(init.to_axis_event().is_some());

        let button = JsEvent::from_bytes(raw(0, 1, JS_EVENT_BUTTON, 3));
        assert!(button.to_axis_event().is_none());
        let button_init = JsEvent::from_bytes(raw(0, 0, JS_EVENT_BUTTON | JS_EVENT_INIT, 3));
        assert!(button_init.to_axis_event().is_none());
    }

    #[tokio::test]
    async fn reads_events_from_file_until_eof() {
        let path = std::env::temp_dir().join(format!("servolink-js-{}", std::process::id()));
        let mut content = Vec::new();
        content.extend_from_slice(&raw(10, 100, JS_EVENT_AXIS | JS_EVENT_INIT, 0));
        content.extend_from_slice(&raw(20, 1, JS_EVENT_BUTTON, 2));
        content.extend_from_slice(&raw(30, -200, JS_EVENT_AXIS, 1));
        // trailing partial event
        content.extend_from_slice(&[0u8; 3]);
        tokio::fs::write(&path, &content).await.unwrap();

        let device = JoystickDevice::open(&path).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let result = device.run(tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(InputError::Closed)));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.axis, first.value), (0, 100));
        assert_eq!((second.axis, second.value), (1, -200));
        assert!(rx.recv().await.is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_device_fails_to_open() {
        let result = JoystickDevice::open(Path::new("/nonexistent/servolink/js9")).await;
        assert!(matches!(result, Err(InputError::Open { .. })));
    }
}
