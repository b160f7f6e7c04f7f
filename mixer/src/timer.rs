//! Hashed timer wheel.
//!
//! Time is quantized into ticks of `resolution` seconds and hashed into a
//! fixed ring of slots. `expire` walks only the slots between the last
//! observed tick and now, so the cost of advancing is bounded by the slot
//! count no matter how far the clock jumped. Entries more than one rotation
//! away share a slot with nearer ones and are skipped until their tick comes.
//!
//! Deadlines round up to the next tick and an entry never fires before its
//! deadline tick has been reached.

#[cfg(test)]
#[path = "timer_test.rs"]
mod timer_test;

use crate::consts::{TIMER_RESOLUTION_SECS, TIMER_SLOTS};

/// Handle returned by [`TimerWheel::schedule`], used to cancel the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    id: u64,
    tick: u64,
}

#[derive(Debug)]
struct Entry<T> {
    id: u64,
    tick: u64,
    payload: T,
}

/// A single-threaded timer wheel carrying a payload per entry.
#[derive(Debug)]
pub struct TimerWheel<T> {
    slots: Vec<Vec<Entry<T>>>,
    resolution: f64,
    current_tick: u64,
    next_id: u64,
    len: usize,
}

impl<T> Default for TimerWheel<T> {
    fn default() -> Self {
        Self::new(TIMER_RESOLUTION_SECS, TIMER_SLOTS)
    }
}

impl<T> TimerWheel<T> {
    /// Create a wheel with `slots` buckets of `resolution` seconds each.
    #[must_use]
    pub fn new(resolution: f64, slots: usize) -> Self {
        let slots = slots.max(1);
        let resolution = if resolution > 0.0 { resolution } else { TIMER_RESOLUTION_SECS };
        Self { slots: (0..slots).map(|_| Vec::new()).collect(), resolution, current_tick: 0, next_id: 0, len: 0 }
    }

    /// Schedule `payload` to fire once the clock reaches `deadline` seconds.
    ///
    /// A deadline at or before the last observed time fires on the next
    /// `expire` that advances the clock.
    pub fn schedule(&mut self, deadline: f64, payload: T) -> TimerKey {
        let tick = self.tick_ceil(deadline).max(self.current_tick + 1);
        let id = self.next_id;
        self.next_id += 1;
        let slot = self.slot_of(tick);
        self.slots[slot].push(Entry { id, tick, payload });
        self.len += 1;
        TimerKey { id, tick }
    }

    /// Remove a pending entry. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        let slot = self.slot_of(key.tick);
        let bucket = &mut self.slots[slot];
        let Some(pos) = bucket.iter().position(|e| e.id == key.id) else {
            return false;
        };
        bucket.swap_remove(pos);
        self.len -= 1;
        true
    }

    /// Advance the clock to `now` seconds and return every payload whose
    /// deadline has been reached, earliest first.
    pub fn expire(&mut self, now: f64) -> Vec<T> {
        let now_tick = self.tick_floor(now);
        if now_tick <= self.current_tick {
            return Vec::new();
        }

        let span = (now_tick - self.current_tick).min(self.slots.len() as u64);
        let mut fired = Vec::new();
        for step in 1..=span {
            let slot = self.slot_of(self.current_tick + step);
            let bucket = &mut self.slots[slot];
            let mut i = 0;
            while i < bucket.len() {
                if bucket[i].tick <= now_tick {
                    fired.push(bucket.swap_remove(i));
                } else {
                    i += 1;
                }
            }
        }

        self.current_tick = now_tick;
        self.len -= fired.len();
        fired.sort_by_key(|e| (e.tick, e.id));
        fired.into_iter().map(|e| e.payload).collect()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn slot_of(&self, tick: u64) -> usize {
        (tick % self.slots.len() as u64) as usize
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn tick_ceil(&self, secs: f64) -> u64 {
        if secs.is_nan() || secs <= 0.0 {
            return 0;
        }
        (secs / self.resolution).ceil() as u64
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn tick_floor(&self, secs: f64) -> u64 {
        if secs.is_nan() || secs <= 0.0 {
            return 0;
        }
        (secs / self.resolution).floor() as u64
    }
}
