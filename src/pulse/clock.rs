//! Precise wait abstraction
//!
//! Sleep primitives on a general-purpose kernel overshoot by hundreds of
//! microseconds, which a servo sees as a twitch. Inside a cycle the scheduler
//! therefore only busy-waits. Between cycles it may sleep, but wakes a margin
//! early and spins the rest of the way to the period boundary.

use std::time::{Duration, Instant};

/// Time source and waiting strategy for the scheduler
pub trait PulseClock: Send {
    /// Microseconds on a monotonic timeline
    fn now_us(&self) -> u64;

    /// Busy-holds the processor until `deadline_us`. Must not sleep.
    /// Returns at once if the deadline has already passed.
    fn spin_until(&mut self, deadline_us: u64);

    /// Gives up the processor until `deadline_us`. Only used between cycles.
    fn idle_until(&mut self, deadline_us: u64);
}

/// Real clock based on [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    spin_margin: Duration,
}

impl MonotonicClock {
    /// `spin_margin` is how long before a period boundary the thread wakes
    /// from sleep to finish the wait by spinning.
    pub fn new(spin_margin: Duration) -> Self {
        Self {
            origin: Instant::now(),
            spin_margin,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new(Duration::from_micros(1_000))
    }
}

impl PulseClock for MonotonicClock {
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn spin_until(&mut self, deadline_us: u64) {
        while self.now_us() < deadline_us {
            std::hint::spin_loop();
        }
    }

    fn idle_until(&mut self, deadline_us: u64) {
        let remaining = deadline_us.saturating_sub(self.now_us());
        let margin = u64::try_from(self.spin_margin.as_micros()).unwrap_or(u64::MAX);
        if remaining > margin {
            std::thread::sleep(Duration::from_micros(remaining - margin));
        }
        self.spin_until(deadline_us);
    }
}
