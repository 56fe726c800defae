//! Pulse generation subsystem
//!
//! 1. [`table`] - immutable pulse tables and their atomic publication
//! 2. [`scheduler`] - per-period pin driving (statum state machine)
//! 3. [`clock`] / [`pins`] - the precise-wait and output-pin boundaries
//! 4. [`sim`] - virtual clock and recording pins for running off-target
//!
//! # Architecture
//!
//! ```text
//! control loop ──publish──► SharedPulseTable ──load──► scheduler thread ──► pins
//!  (tokio task)               (ArcSwap)                 (dedicated OS thread)
//! ```
//!
//! The scheduler owns its OS thread for the whole run. Nothing upstream can
//! make it block or fail: a missing or stale table just repeats the last
//! published pulses.

pub mod clock;
pub mod pins;
pub mod scheduler;
pub mod sim;
pub mod table;

pub use clock::{MonotonicClock, PulseClock};
pub use pins::{GpioPins, NullPins, PinBank, PinError, PinLevel};
pub use scheduler::{
    CycleReport, Cycling, Idle, PulseScheduler, SchedulerSettings, SchedulerStats, StatsSnapshot,
    DEFAULT_PERIOD_US,
};
pub use table::{PinMap, PulseSlot, PulseTable, SharedPulseTable};

use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Running scheduler thread
pub struct SchedulerHandle {
    cancel: CancellationToken,
    stats: Arc<SchedulerStats>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Creates the scheduler, moves it onto its own thread and starts cycling.
    pub fn spawn(
        pins: Box<dyn PinBank>,
        clock: Box<dyn PulseClock>,
        table: SharedPulseTable,
        settings: SchedulerSettings,
        cancel: CancellationToken,
    ) -> std::io::Result<Self> {
        let idle = PulseScheduler::create(pins, clock, table, settings);
        let stats = idle.stats();
        let token = cancel.clone();

        let thread = std::thread::Builder::new()
            .name("pulse-scheduler".into())
            .spawn(move || {
                let cycling = idle.start();
                let _idle = cycling.run(&token);
            })?;
        info!("Pulse scheduler thread started");

        Ok(Self {
            cancel,
            stats,
            thread: Some(thread),
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops cycling and waits until every pin has been driven low.
    pub fn stop(mut self) {
        self.cancel.cancel();
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Pulse scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join();
    }
}
