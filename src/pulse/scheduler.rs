//! Pulse Scheduler - the real-time core
//!
//! Every period the scheduler raises the pin of every active channel at once
//! and then drops them one by one, shortest pulse first:
//!
//! ```text
//!           0        1250      2000                     20000
//! pin A  ───┐▔▔▔▔▔▔▔▔┐___________________________________┌▔▔▔
//! pin B  ───┐▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔┐_________________________┌▔▔▔
//!           │ spin   │  spin   │        idle             │
//!           fire                                        fire + T
//! ```
//!
//! Inside a cycle the thread only spins: no sleeping, no locks, no I/O. The
//! table is loaded once at the start, so an update published mid-cycle is
//! only seen by the next cycle.
//!
//! # Re-arm policy
//!
//! The next firing is scheduled at *this* cycle's actual firing time plus the
//! period. An overrun therefore delays the following cycle's start by the
//! overrun amount but never compounds across cycles. Moving to a nominal-grid
//! schedule changes the jitter profile and needs end-to-end timing re-checked.
//!
//! # State Machine
//!
//! ```text
//! Idle ──start──► Cycling ──shutdown──► Idle
//! ```

use super::clock::PulseClock;
use super::pins::{PinBank, PinLevel};
use super::table::SharedPulseTable;
use statum::{machine, state};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reference servo period: 50 Hz
pub const DEFAULT_PERIOD_US: u32 = 20_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub period_us: u32,
    /// Every pin that may carry a pulse. Held low while idle.
    pub pins: Vec<u8>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            period_us: DEFAULT_PERIOD_US,
            pins: Vec::new(),
        }
    }
}

/// Outcome of a single period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub pulses: usize,
    /// Time from first rising edge to last falling edge
    pub busy_us: u64,
    /// Slots whose width was below the running elapsed time
    pub ordering_violations: u32,
    pub overrun: bool,
}

/// Counters shared between the scheduler thread and the control loop
#[derive(Debug, Default)]
pub struct SchedulerStats {
    cycles: AtomicU64,
    overruns: AtomicU64,
    ordering_violations: AtomicU64,
    max_busy_us: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub overruns: u64,
    pub ordering_violations: u64,
    pub max_busy_us: u64,
}

impl SchedulerStats {
    fn record(&self, report: &CycleReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if report.overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        if report.ordering_violations > 0 {
            self.ordering_violations
                .fetch_add(u64::from(report.ordering_violations), Ordering::Relaxed);
        }
        self.max_busy_us.fetch_max(report.busy_us, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            ordering_violations: self.ordering_violations.load(Ordering::Relaxed),
            max_busy_us: self.max_busy_us.load(Ordering::Relaxed),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SchedulerState {
    Idle,
    Cycling,
}

#[machine]
pub struct PulseScheduler<S: SchedulerState> {
    pins: Box<dyn PinBank>,
    clock: Box<dyn PulseClock>,
    table: SharedPulseTable,
    settings: SchedulerSettings,
    stats: Arc<SchedulerStats>,
}

impl<S: SchedulerState> PulseScheduler<S> {
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    pub fn table(&self) -> &SharedPulseTable {
        &self.table
    }

    fn drive_all_low(&mut self) {
        for &pin in &self.settings.pins {
            self.pins.set_level(pin, PinLevel::Low);
        }
    }
}

impl PulseScheduler<Idle> {
    pub fn create(
        pins: Box<dyn PinBank>,
        clock: Box<dyn PulseClock>,
        table: SharedPulseTable,
        settings: SchedulerSettings,
    ) -> Self {
        debug!("Creating pulse scheduler with settings: {:?}", settings);
        let mut scheduler = Self::new(
            pins,
            clock,
            table,
            settings,
            Arc::new(SchedulerStats::default()),
        );
        scheduler.drive_all_low();
        scheduler
    }

    pub fn start(self) -> PulseScheduler<Cycling> {
        info!(
            "Pulse scheduler cycling every {} µs on {} pins",
            self.settings.period_us,
            self.settings.pins.len()
        );
        self.transition()
    }
}

impl PulseScheduler<Cycling> {
    /// Runs one period's worth of pulses and returns once the last pin is low.
    pub fn run_cycle(&mut self) -> CycleReport {
        let table = self.table.load();
        let start = self.clock.now_us();

        for slot in table.slots() {
            self.pins.set_level(slot.pin, PinLevel::High);
        }

        let mut elapsed: u32 = 0;
        let mut ordering_violations = 0;
        for slot in table.slots() {
            if slot.width_us > elapsed {
                self.clock.spin_until(start + u64::from(slot.width_us));
                elapsed = slot.width_us;
            } else if slot.width_us < elapsed {
                // deadline already passed, drop now
                ordering_violations += 1;
            }
            self.pins.set_level(slot.pin, PinLevel::Low);
        }

        let busy_us = self.clock.now_us().saturating_sub(start);
        let report = CycleReport {
            pulses: table.len(),
            busy_us,
            ordering_violations,
            overrun: busy_us >= u64::from(self.settings.period_us),
        };
        self.stats.record(&report);
        report
    }

    /// Cycles until `cancel` fires, then returns to idle with all pins low.
    pub fn run(mut self, cancel: &CancellationToken) -> PulseScheduler<Idle> {
        let period = u64::from(self.settings.period_us);
        while !cancel.is_cancelled() {
            let fired_at = self.clock.now_us();
            self.run_cycle();
            self.clock.idle_until(fired_at + period);
        }
        self.shutdown()
    }

    pub fn shutdown(mut self) -> PulseScheduler<Idle> {
        self.drive_all_low();
        let stats = self.stats.snapshot();
        info!(
            "Pulse scheduler stopped after {} cycles ({} overruns, {} ordering violations)",
            stats.cycles, stats.overruns, stats.ordering_violations
        );
        self.transition()
    }
}
