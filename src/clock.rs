//! Wall-clock sources and the elapsed-seconds clock
//!
//! Elapsed time is always derived from `now - start_at` and never
//! accumulated, so a suspended process or a sleeping machine catches up on
//! the next tick instead of drifting.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use coursetimers::clock::{Clock, ManualClock};
///
/// let t0 = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
/// let clock = ManualClock::new(t0);
/// clock.advance(Duration::seconds(90));
/// assert_eq!(clock.now(), t0 + Duration::seconds(90));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, with a negative duration)
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whole seconds between `start_at` and `now`, floored, never negative
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use coursetimers::clock::elapsed_seconds;
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
/// assert_eq!(elapsed_seconds(start, start + Duration::milliseconds(1999)), 1);
/// assert_eq!(elapsed_seconds(start, start - Duration::seconds(5)), 0);
/// ```
pub fn elapsed_seconds(start_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (now - start_at).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

/// Elapsed-seconds clock for the active session
///
/// Holds the start instant of the running session (if any) and the value
/// computed at the last tick. With no session it reads 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElapsedClock {
    start_at: Option<DateTime<Utc>>,
    last_elapsed: u64,
}

impl ElapsedClock {
    /// Clock that is not ticking
    pub fn idle() -> Self {
        Self::default()
    }

    /// Start measuring from `start_at`, seeding the displayed value
    ///
    /// `seed` is the value shown until the next tick, used when restoring a
    /// persisted snapshot.
    pub fn start(&mut self, start_at: DateTime<Utc>, seed: u64) {
        self.start_at = Some(start_at);
        self.last_elapsed = seed;
    }

    /// Stop measuring; the value drops to 0
    pub fn stop(&mut self) {
        self.start_at = None;
        self.last_elapsed = 0;
    }

    /// Whether a session is being measured
    pub fn is_ticking(&self) -> bool {
        self.start_at.is_some()
    }

    /// Start instant of the measured session
    pub fn start_at(&self) -> Option<DateTime<Utc>> {
        self.start_at
    }

    /// Value computed at the last tick
    pub fn last_elapsed(&self) -> u64 {
        self.last_elapsed
    }

    /// Elapsed seconds at `now` without recording it
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        self.start_at
            .map(|start| elapsed_seconds(start, now))
            .unwrap_or(0)
    }

    /// Recompute from `now`; returns true when the value changed
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let next = self.elapsed_at(now);
        let changed = next != self.last_elapsed;
        self.last_elapsed = next;
        changed
    }
}
