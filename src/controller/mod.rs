//! Controller subsystem - joystick axis input for the host
//!
//! 1. [`joystick_device`] - raw Linux joystick device reader
//! 2. [`event_collector`] - gilrs gamepad collection (statum state machine)
//! 3. [`controller_handle`] - source selection and lifecycle
//!
//! Both sources emit [`AxisEvent`]s with raw values in `[-32768, 32767]`.

pub mod controller_handle;
pub mod event_collector;
pub mod joystick_device;

pub use controller_handle::{ControllerHandle, ControllerSettings, InputSource};

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// A joystick axis moved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisEvent {
    pub axis: u8,
    pub value: i16,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to open joystick {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read joystick: {0}")]
    Read(#[source] std::io::Error),

    #[error("gamepad interface: {0}")]
    Gamepad(String),

    #[error("no gamepad matching {0:?} connected")]
    NoGamepad(String),

    #[error("input source closed")]
    Closed,
}
