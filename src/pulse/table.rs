//! Pulse table - what the scheduler consumes every period
//!
//! A pulse table joins a converted snapshot with the channel → pin map, so a
//! single immutable value carries both the pin and the width of every pulse.
//! Tables are never edited after construction. The control loop builds a new
//! one per received snapshot and publishes it with one atomic pointer swap;
//! the scheduler loads one `Arc` per cycle and uses it for the whole cycle.
//!
//! ```text
//! control loop                         scheduler thread
//! ────────────                         ────────────────
//! build PulseTable
//! publish ──► ArcSwap<PulseTable> ◄── load (once per cycle)
//! ```

use crate::snapshot::{ChannelId, ChannelSnapshot};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Static channel → output pin binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinMap {
    bindings: HashMap<ChannelId, u8>,
}

impl PinMap {
    pub fn new(bindings: impl IntoIterator<Item = (ChannelId, u8)>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }

    pub fn pin_for(&self, channel: ChannelId) -> Option<u8> {
        self.bindings.get(&channel).copied()
    }

    /// Every bound pin, ascending
    pub fn pins(&self) -> Vec<u8> {
        let mut pins: Vec<u8> = self.bindings.values().copied().collect();
        pins.sort_unstable();
        pins
    }
}

/// One pulse: drive `pin` high at cycle start, low after `width_us`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSlot {
    pub channel: ChannelId,
    pub pin: u8,
    pub width_us: u32,
}

/// Immutable, width-sorted list of pulses for one or more cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseTable {
    slots: Vec<PulseSlot>,
}

impl PulseTable {
    /// Builds the table for `converted`, whose magnitudes are pulse widths.
    ///
    /// Negative widths become 0 (no observable pulse), widths above
    /// `max_width_us` are capped. Channels without a pin are left out.
    pub fn plan(converted: &ChannelSnapshot, pins: &PinMap, max_width_us: u32) -> Self {
        let mut slots = Vec::with_capacity(converted.len());
        for record in converted.active() {
            let Some(channel) = record.channel else {
                continue;
            };
            let Some(pin) = pins.pin_for(channel) else {
                debug!("Channel {} has no pin binding, skipping", channel);
                continue;
            };
            let width_us = u32::try_from(record.magnitude)
                .unwrap_or(0)
                .min(max_width_us);
            slots.push(PulseSlot {
                channel,
                pin,
                width_us,
            });
        }
        // scheduler walks slots in this order
        slots.sort_by_key(|s| s.width_us);
        Self { slots }
    }

    /// Wraps `slots` as-is, without sorting.
    #[cfg(test)]
    pub(crate) fn from_slots_unchecked(slots: Vec<PulseSlot>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[PulseSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Longest pulse in the table, 0 when empty
    pub fn longest_us(&self) -> u32 {
        self.slots.iter().map(|s| s.width_us).max().unwrap_or(0)
    }
}

/// Single-writer, lock-free publication point for pulse tables
#[derive(Debug, Clone)]
pub struct SharedPulseTable {
    current: Arc<ArcSwap<PulseTable>>,
}

impl SharedPulseTable {
    pub fn new(initial: PulseTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Replaces the published table. Readers see the old or the new table,
    /// never a mix.
    pub fn publish(&self, table: PulseTable) {
        self.current.store(Arc::new(table));
    }

    pub fn load(&self) -> Arc<PulseTable> {
        self.current.load_full()
    }
}

impl Default for SharedPulseTable {
    fn default() -> Self {
        Self::new(PulseTable::default())
    }
}
