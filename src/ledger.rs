//! Per-timer manual offsets and banked elapsed time
//!
//! Offsets are signed corrections layered on top of clock-measured time.
//! Banked seconds are clock-measured time of sessions that ended locally.
//! Only the active timer's offset is clamped; an inactive timer's offset is
//! the plain sum of its adjustments.

use std::collections::HashMap;

/// The active timer and its live elapsed seconds, used for clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveTimer<'a> {
    /// Timer currently running
    pub timer_id: &'a str,
    /// Live elapsed seconds of its session, computed at call time
    pub elapsed_seconds: u64,
}

/// Offset and banked-time bookkeeping keyed by timer id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetLedger {
    offsets: HashMap<String, i64>,
    banked: HashMap<String, u64>,
}

impl OffsetLedger {
    /// Create a ledger from persisted maps
    pub fn from_parts(offsets: HashMap<String, i64>, banked: HashMap<String, u64>) -> Self {
        Self { offsets, banked }
    }

    /// Add `delta_seconds` to `timer_id`'s offset
    ///
    /// When `timer_id` is the live timer the result is clamped so that
    /// `elapsed + offset >= 0`. An offset already below that floor is left
    /// where it is rather than raised, so the applied amount never has the
    /// opposite sign of the request. Returns the amount actually applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use coursetimers::ledger::{LiveTimer, OffsetLedger};
    ///
    /// let mut ledger = OffsetLedger::default();
    /// let live = LiveTimer { timer_id: "math", elapsed_seconds: 90 };
    ///
    /// assert_eq!(ledger.adjust("math", -60, Some(live)), -60);
    /// assert_eq!(ledger.adjust("math", -600, Some(live)), -30);
    /// assert_eq!(ledger.read("math"), -90);
    /// ```
    pub fn adjust(&mut self, timer_id: &str, delta_seconds: i64, live: Option<LiveTimer<'_>>) -> i64 {
        let current = self.read(timer_id);
        let mut next = current.saturating_add(delta_seconds);

        if let Some(live) = live.filter(|live| live.timer_id == timer_id) {
            let floor = -(live.elapsed_seconds as i64);
            next = next.max(current.min(floor));
        }

        self.offsets.insert(timer_id.to_string(), next);
        next - current
    }

    /// Current offset for `timer_id`, 0 when unseen
    pub fn read(&self, timer_id: &str) -> i64 {
        self.offsets.get(timer_id).copied().unwrap_or(0)
    }

    /// Fold clock-measured seconds into the timer's banked total
    ///
    /// Returns false (and does nothing) for an empty id or zero seconds.
    pub fn bank(&mut self, timer_id: &str, seconds: u64) -> bool {
        if timer_id.is_empty() || seconds == 0 {
            return false;
        }
        let entry = self.banked.entry(timer_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(seconds);
        true
    }

    /// Banked seconds for `timer_id`, 0 when unseen
    pub fn banked(&self, timer_id: &str) -> u64 {
        self.banked.get(timer_id).copied().unwrap_or(0)
    }

    /// Signed total: banked + live elapsed (when active) + offset
    pub fn total_seconds(&self, timer_id: &str, live: Option<LiveTimer<'_>>) -> i64 {
        let live_elapsed = live
            .filter(|live| live.timer_id == timer_id)
            .map(|live| live.elapsed_seconds as i64)
            .unwrap_or(0);
        self.banked(timer_id) as i64 + live_elapsed + self.read(timer_id)
    }

    /// All offsets
    pub fn offsets(&self) -> &HashMap<String, i64> {
        &self.offsets
    }

    /// All banked totals
    pub fn banked_all(&self) -> &HashMap<String, u64> {
        &self.banked
    }
}
