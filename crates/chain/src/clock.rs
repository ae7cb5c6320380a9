use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use ream_consensus::{
    constants::GENESIS_SLOT,
    primitives::{Slot, UnixSeconds},
};

/// Wall-clock slot derivation. Reported slots never go backwards, even if the system clock does.
#[derive(Debug)]
pub struct SlotClock {
    genesis_time: UnixSeconds,
    seconds_per_slot: u64,
    highest_slot: AtomicU64,
}

impl SlotClock {
    pub fn new(genesis_time: UnixSeconds, seconds_per_slot: u64) -> Self {
        Self {
            genesis_time,
            seconds_per_slot: seconds_per_slot.max(1),
            highest_slot: AtomicU64::new(GENESIS_SLOT),
        }
    }

    pub fn genesis_time(&self) -> UnixSeconds {
        self.genesis_time
    }

    pub fn seconds_per_slot(&self) -> u64 {
        self.seconds_per_slot
    }

    /// Slot at unix ``time``. Times before genesis map to the genesis slot.
    pub fn slot_at(&self, time: UnixSeconds) -> Slot {
        GENESIS_SLOT + time.saturating_sub(self.genesis_time) / self.seconds_per_slot
    }

    /// Record an observation of ``time`` and return the highest slot seen so far.
    pub fn observe(&self, time: UnixSeconds) -> Slot {
        let slot = self.slot_at(time);
        self.highest_slot.fetch_max(slot, Ordering::AcqRel).max(slot)
    }

    pub fn current_slot(&self) -> Slot {
        self.observe(unix_now().as_secs())
    }

    /// Time left until the next slot starts, or until genesis if it is still ahead.
    pub fn duration_to_next_slot(&self) -> Duration {
        let now = unix_now();
        let genesis = Duration::from_secs(self.genesis_time);
        if now < genesis {
            return genesis - now;
        }
        let slot_duration = Duration::from_secs(self.seconds_per_slot);
        let into_slot = Duration::from_nanos(
            ((now - genesis).as_nanos() % slot_duration.as_nanos()) as u64,
        );
        slot_duration - into_slot
    }
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}
