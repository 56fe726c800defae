//! Virtual time and recording pins
//!
//! Lets the scheduling algorithm run without real timing or hardware: the
//! clock jumps straight to every deadline and the pin bank records each
//! transition with the virtual time it happened at.

use super::clock::PulseClock;
use super::pins::{PinBank, PinLevel};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared reading of a [`ManualClock`]
#[derive(Debug, Clone, Default)]
pub struct ClockHandle(Arc<AtomicU64>);

impl ClockHandle {
    pub fn now_us(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn advance(&self, us: u64) {
        self.0.fetch_add(us, Ordering::AcqRel);
    }

    fn advance_to(&self, deadline_us: u64) {
        self.0.fetch_max(deadline_us, Ordering::AcqRel);
    }
}

/// Clock that never waits; reaching a deadline moves virtual time forward
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: ClockHandle,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ClockHandle {
        self.now.clone()
    }
}

impl PulseClock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.now_us()
    }

    fn spin_until(&mut self, deadline_us: u64) {
        self.now.advance_to(deadline_us);
    }

    fn idle_until(&mut self, deadline_us: u64) {
        self.now.advance_to(deadline_us);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub at_us: u64,
    pub pin: u8,
    pub level: PinLevel,
}

/// Read side of a [`RecordingPins`] log
#[derive(Debug, Clone, Default)]
pub struct PinJournal(Arc<Mutex<Vec<Transition>>>);

impl PinJournal {
    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<Transition> {
        self.0
            .lock()
            .map(|mut log| std::mem::take(&mut *log))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pin bank that records every write against a virtual clock
#[derive(Debug, Clone)]
pub struct RecordingPins {
    clock: ClockHandle,
    journal: PinJournal,
}

impl RecordingPins {
    pub fn new(clock: ClockHandle) -> Self {
        Self {
            clock,
            journal: PinJournal::default(),
        }
    }

    pub fn journal(&self) -> PinJournal {
        self.journal.clone()
    }
}

impl PinBank for RecordingPins {
    fn set_level(&mut self, pin: u8, level: PinLevel) {
        if let Ok(mut log) = self.journal.0.lock() {
            log.push(Transition {
                at_us: self.clock.now_us(),
                pin,
                level,
            });
        }
    }
}
