use super::{AxisEvent, InputError};
use chrono::Local;
use gilrs::{Axis, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Axis slots tracked per gamepad, numbered like the kernel joystick API
pub const AXIS_COUNT: usize = 8;

// Collector settings
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    pub joystick_deadzone: f32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            joystick_deadzone: 0.0,
        }
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Gamepad whose events are forwarded
    active_gamepad: Option<GamepadId>,

    settings: CollectorSettings,

    event_sender: mpsc::Sender<AxisEvent>,

    // Last forwarded value per axis, suppresses repeats
    last_values: [i16; AXIS_COUNT],
}

// Implementation of methods available in all states
impl<S: CollectionState> EventCollector<S> {
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }
}

impl EventCollector<Initializing> {
    pub fn create(
        settings: Option<CollectorSettings>,
        event_sender: mpsc::Sender<AxisEvent>,
    ) -> Result<Self, InputError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            error!("Failed to initialize gilrs: {}", e);
            InputError::Gamepad(e.to_string())
        })?;

        Ok(Self::new(
            gilrs,
            None,
            settings,
            event_sender,
            [0; AXIS_COUNT],
        ))
    }

    /// Selects the gamepad whose name contains `name` (case-insensitive) and
    /// starts collecting.
    pub fn initialize(mut self, name: &str) -> Result<EventCollector<Collecting>, InputError> {
        let wanted = name.to_lowercase();
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
        info!("Found {} gamepads", gamepads.len());
        for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
            info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
        }

        let selected = gamepads
            .iter()
            .find(|(_, gamepad)| gamepad.name().to_lowercase().contains(&wanted))
            .map(|(id, gamepad)| (*id, gamepad.name().to_string()));
        let Some((id, gamepad_name)) = selected else {
            return Err(InputError::NoGamepad(name.to_string()));
        };
        self.active_gamepad = Some(id);
        info!("Selected gamepad: {} ({})", gamepad_name, id);

        info!("Event Collector initialized, transitioning to Collecting state");
        Ok(self.transition())
    }
}

impl EventCollector<Collecting> {
    /// Handles one pending gilrs event. Returns whether an axis event was
    /// forwarded.
    pub fn collect_next_event(&mut self) -> Result<bool, InputError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event() else {
            return Ok(false);
        };
        if self.active_gamepad.is_some_and(|active| active != id) {
            return Ok(false);
        }

        match event {
            EventType::AxisChanged(axis, value, _) => {
                let Some(index) = axis_index(axis) else {
                    debug!("Ignoring unsupported axis: {:?}", axis);
                    return Ok(false);
                };
                let value = apply_deadzone(value, self.settings.joystick_deadzone);
                let raw = to_raw_axis(axis, value);
                if self.last_values[usize::from(index)] == raw {
                    return Ok(false);
                }
                self.last_values[usize::from(index)] = raw;
                self.forward(AxisEvent {
                    axis: index,
                    value: raw,
                    timestamp: Local::now(),
                })
            }
            EventType::Disconnected => {
                warn!("Gamepad {} disconnected", id);
                Err(InputError::Closed)
            }
            _ => Ok(false),
        }
    }

    fn forward(&mut self, event: AxisEvent) -> Result<bool, InputError> {
        match self.event_sender.try_send(event) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(event)) => {
                warn!("Axis event queue full, dropping {:?}", event);
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(InputError::Closed),
        }
    }

    /// Polls gilrs until `cancel` fires or the gamepad goes away.
    pub fn run_collection_loop(&mut self, cancel: &CancellationToken) -> Result<(), InputError> {
        info!("Starting Event Collector loop");

        let mut event_count: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        while !cancel.is_cancelled() {
            if self.collect_next_event()? {
                event_count += 1;
            } else {
                std::thread::sleep(std::time::Duration::from_micros(500));
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Event Collector stats: forwarded {} axis events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }
        }
        info!("Event Collector loop stopped");
        Ok(())
    }
}

/// Kernel joystick numbering of the standard gamepad axes
fn axis_index(axis: Axis) -> Option<u8> {
    match axis {
        Axis::LeftStickX => Some(0),
        Axis::LeftStickY => Some(1),
        Axis::LeftZ => Some(2),
        Axis::RightStickX => Some(3),
        Axis::RightStickY => Some(4),
        Axis::RightZ => Some(5),
        Axis::DPadX => Some(6),
        Axis::DPadY => Some(7),
        _ => None,
    }
}

/// Scales a gilrs value in [-1.0, 1.0] to the raw joystick range.
///
/// gilrs reports stick Y axes up-positive, the kernel API down-positive.
fn to_raw_axis(axis: Axis, value: f32) -> i16 {
    let value = match axis {
        Axis::LeftStickY | Axis::RightStickY | Axis::DPadY => -value,
        _ => value,
    };
    // `as` saturates
    (value.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        // Rescale the value to the range outside the deadzone
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_zeroes_and_rescales() {
        assert_eq!(apply_deadzone(0.04, 0.05), 0.0);
        assert_eq!(apply_deadzone(1.0, 0.05), 1.0);
        assert!((apply_deadzone(-0.525, 0.05) + 0.5).abs() < 1e-6);
        assert_eq!(apply_deadzone(0.3, 0.0), 0.3);
    }

    #[test]
    fn raw_axis_scaling() {
        assert_eq!(to_raw_axis(Axis::LeftStickX, 1.0), 32767);
        assert_eq!(to_raw_axis(Axis::LeftStickX, -1.0), -32767);
        assert_eq!(to_raw_axis(Axis::LeftStickX, 0.0), 0);
        assert_eq!(to_raw_axis(Axis::LeftStickY, 1.0), -32767);
        assert_eq!(to_raw_axis(Axis::RightZ, 2.0), 32767);
    }

    #[test]
    fn axis_numbering() {
        assert_eq!(axis_index(Axis::LeftStickX), Some(0));
        assert_eq!(axis_index(Axis::RightStickY), Some(4));
        assert_eq!(axis_index(Axis::Unknown), None);
    }
}
