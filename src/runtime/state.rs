//! Read-only views of the runtime state

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::gateway::Session;

/// Whether a timer is running
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuntimeState {
    /// No active session; the clock is not ticking
    Idle,
    /// A session is active and the clock is ticking
    Running {
        /// Running timer
        timer_id: String,
        /// Its active session
        session_id: String,
    },
}

impl RuntimeState {
    /// State implied by an active session, or its absence
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self::Running {
                timer_id: session.timer_id.clone(),
                session_id: session.id.clone(),
            },
            None => Self::Idle,
        }
    }

    /// Running timer, if any
    pub fn timer_id(&self) -> Option<&str> {
        match self {
            Self::Running { timer_id, .. } => Some(timer_id),
            Self::Idle => None,
        }
    }

    /// Whether `timer_id` is the running timer
    pub fn is_running(&self, timer_id: &str) -> bool {
        self.timer_id() == Some(timer_id)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running {
                timer_id,
                session_id,
            } => write!(f, "running {} (session {})", timer_id, session_id),
        }
    }
}

/// Everything a display needs, captured at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeSnapshot {
    /// Idle or running
    pub state: RuntimeState,
    /// The session believed active
    pub active_session: Option<Session>,
    /// Elapsed seconds of the active session at the last tick
    pub elapsed_seconds: u64,
    /// A start or stop request is in flight
    pub busy: bool,
    /// The first refresh has not completed yet
    pub loading: bool,
    /// Per-timer manual offsets
    pub offsets: HashMap<String, i64>,
    /// Per-timer banked elapsed seconds
    pub banked: HashMap<String, u64>,
    /// Part of the running timer's offset added during this session
    pub active_adjustment_seconds: i64,
}

impl RuntimeSnapshot {
    /// Offset of `timer_id`, 0 when unseen
    pub fn offset(&self, timer_id: &str) -> i64 {
        self.offsets.get(timer_id).copied().unwrap_or(0)
    }

    /// Signed total: banked + live elapsed (when running) + offset
    pub fn total_seconds(&self, timer_id: &str) -> i64 {
        let live = if self.state.is_running(timer_id) {
            self.elapsed_seconds as i64
        } else {
            0
        };
        let banked = self.banked.get(timer_id).copied().unwrap_or(0) as i64;
        banked + live + self.offset(timer_id)
    }

    /// Total floored at zero, as shown to the user
    pub fn display_seconds(&self, timer_id: &str) -> u64 {
        self.total_seconds(timer_id).max(0) as u64
    }

    /// Every timer with an offset, banked time, or a running session
    pub fn known_timers(&self) -> Vec<String> {
        let mut timers: Vec<String> = self
            .offsets
            .keys()
            .chain(self.banked.keys())
            .cloned()
            .chain(self.state.timer_id().map(str::to_string))
            .collect();
        timers.sort();
        timers.dedup();
        timers
    }
}
