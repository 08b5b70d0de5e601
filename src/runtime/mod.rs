//! Timer runtime controller
//!
//! [`TimerRuntime`] owns the answer to "what is being timed right now". It
//! composes the session gateway, the elapsed clock, the offset ledger and
//! local persistence, and mediates every transition:
//!
//! ```text
//!            start_timer(t)                 start_timer(u), u != t
//!   Idle  ------------------>  Running(t)  ------------------------> Running(u)
//!    ^                           |
//!    +------ stop_timer() -------+          refresh(): adopt the server's view
//! ```
//!
//! The server is authoritative. Local state is a cache that lets a restart
//! show the running clock before the first refresh completes.
//!
//! # Concurrency
//!
//! State sits behind a mutex that is never held across an await. A start or
//! stop marks the runtime busy for the duration of its request; a second
//! start or stop in that window fails with [`RuntimeError::Busy`], and a
//! refresh is skipped.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use coursetimers::clock::ManualClock;
//! use coursetimers::gateway::fake::ScriptedGateway;
//! use coursetimers::runtime::{RuntimeSettings, RuntimeState, TimerRuntime};
//! use coursetimers::storage::LocalState;
//!
//! # tokio_test::block_on(async {
//! let clock = Arc::new(ManualClock::new(Utc::now()));
//! let gateway = Arc::new(ScriptedGateway::new(clock.clone()));
//! let runtime = TimerRuntime::new(gateway, LocalState::in_memory(), clock, RuntimeSettings::default());
//!
//! runtime.start_timer("math").await.unwrap();
//! assert_eq!(runtime.state().timer_id(), Some("math"));
//!
//! runtime.stop_timer().await.unwrap();
//! assert_eq!(runtime.state(), RuntimeState::Idle);
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Clock, ElapsedClock};
use crate::error::RuntimeError;
use crate::gateway::{Session, SessionGateway, StartRequest, StopRequest};
use crate::ledger::{LiveTimer, OffsetLedger};
use crate::storage::{LocalState, StoredActiveSession};

pub mod listeners;
mod scheduler;
pub mod state;

pub use listeners::{Listener, ListenerId};
pub use state::{RuntimeSnapshot, RuntimeState};

use listeners::Listeners;
use scheduler::Background;

/// Tunables of a runtime instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// IANA time zone sent with start requests
    pub time_zone: String,
    /// Cadence of the elapsed clock
    pub tick_interval: Duration,
    /// Cadence of the reconciliation poll
    pub refresh_interval: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            tick_interval: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(15),
        }
    }
}

/// Result of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server agreed with the local view
    Unchanged,
    /// The local view was replaced by the server's
    Adopted,
    /// A start or stop was in flight, so nothing was applied
    Skipped,
}

/// Mutable state, only touched under the lock
#[derive(Debug)]
struct Core {
    active: Option<Session>,
    elapsed: ElapsedClock,
    ledger: OffsetLedger,
    adjustment: i64,
    busy: bool,
    loading: bool,
    /// Bumped by every completed start or stop
    generation: u64,
}

impl Core {
    fn restore(local: &LocalState) -> Self {
        let mut core = Self {
            active: None,
            elapsed: ElapsedClock::idle(),
            ledger: OffsetLedger::from_parts(local.load_offsets(), local.load_banked()),
            adjustment: 0,
            busy: false,
            loading: true,
            generation: 0,
        };

        if let Some(stored) = local
            .load_active_session()
            .filter(|stored| stored.active_session.is_active())
        {
            let session = stored.active_session;
            core.elapsed.start(session.start_at, stored.elapsed_seconds);
            core.adjustment = local.session_adjustment(&session.id);
            debug!(session_id = %session.id, timer_id = %session.timer_id, "Restored active session");
            core.active = Some(session);
        }
        core
    }

    fn live_elapsed(&self, now: chrono::DateTime<chrono::Utc>) -> u64 {
        self.elapsed.elapsed_at(now)
    }

    /// Replace the believed active session; returns true if anything changed
    ///
    /// A new session identity resets the session adjustment to whatever was
    /// stored for that id, which is 0 for a session never seen before. The
    /// stored adjustment of the session being left is dropped.
    fn adopt(
        &mut self,
        session: Option<Session>,
        local: &LocalState,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let same_identity = matches!(
            (&self.active, &session),
            (Some(current), Some(next)) if current.id == next.id
        );

        if same_identity {
            let changed = self.active != session;
            if let Some(next) = session {
                if self.elapsed.start_at() != Some(next.start_at) {
                    self.elapsed.start(next.start_at, 0);
                }
                self.active = Some(next);
            }
            self.elapsed.tick(now);
            return changed;
        }

        if self.active.is_none() && session.is_none() {
            return false;
        }

        if let Some(previous) = &self.active {
            local.remove_session_adjustment(&previous.id);
        }

        match &session {
            Some(next) => {
                self.adjustment = local.session_adjustment(&next.id);
                self.elapsed.start(next.start_at, 0);
                self.elapsed.tick(now);
            }
            None => {
                self.adjustment = 0;
                self.elapsed.stop();
            }
        }
        self.active = session;
        true
    }

    fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            state: RuntimeState::from_session(self.active.as_ref()),
            active_session: self.active.clone(),
            elapsed_seconds: self.elapsed.last_elapsed(),
            busy: self.busy,
            loading: self.loading,
            offsets: self.ledger.offsets().clone(),
            banked: self.ledger.banked_all().clone(),
            active_adjustment_seconds: if self.active.is_some() {
                self.adjustment
            } else {
                0
            },
        }
    }
}

pub(crate) struct Inner {
    gateway: Arc<dyn SessionGateway>,
    local: LocalState,
    clock: Arc<dyn Clock>,
    settings: RuntimeSettings,
    core: Mutex<Core>,
    listeners: Listeners,
    background: Mutex<Option<Background>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let background = self
            .background
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(background) = background {
            background.cancel();
        }
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist_session(&self, core: &Core) {
        match &core.active {
            Some(session) => self.local.save_active_session(Some(&StoredActiveSession {
                active_session: session.clone(),
                elapsed_seconds: core.elapsed.last_elapsed(),
            })),
            None => self.local.save_active_session(None),
        }
    }

    fn persist_adjustment(&self, core: &Core) {
        if let Some(session) = &core.active {
            self.local.save_session_adjustment(&session.id, core.adjustment);
        }
    }

    fn persist_ledger(&self, core: &Core) {
        self.local.save_offsets(core.ledger.offsets());
        self.local.save_banked(core.ledger.banked_all());
    }
}

/// Handle to a timer runtime
///
/// Cloning is cheap and every clone drives the same instance. Separate
/// instances share nothing.
#[derive(Clone)]
pub struct TimerRuntime {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TimerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRuntime")
            .field("state", &self.state())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl TimerRuntime {
    /// Build a runtime, restoring whatever `local` remembers
    ///
    /// The restored session is only a belief; it is checked against the
    /// server by the first [`TimerRuntime::refresh`]. Until then the
    /// snapshot reports `loading`.
    pub fn new(
        gateway: Arc<dyn SessionGateway>,
        local: LocalState,
        clock: Arc<dyn Clock>,
        settings: RuntimeSettings,
    ) -> Self {
        let core = Core::restore(&local);
        Self {
            inner: Arc::new(Inner {
                gateway,
                local,
                clock,
                settings,
                core: Mutex::new(core),
                listeners: Listeners::default(),
                background: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    /// Settings this runtime was built with
    pub fn settings(&self) -> &RuntimeSettings {
        &self.inner.settings
    }

    /// Current snapshot
    pub fn snapshot(&self) -> RuntimeSnapshot {
        self.inner.core().snapshot()
    }

    /// Idle or running
    pub fn state(&self) -> RuntimeState {
        RuntimeState::from_session(self.inner.core().active.as_ref())
    }

    /// Elapsed seconds of the active session at the last tick
    pub fn elapsed_seconds(&self) -> u64 {
        self.inner.core().elapsed.last_elapsed()
    }

    /// Offset of `timer_id`, 0 when unseen
    pub fn offset(&self, timer_id: &str) -> i64 {
        self.inner.core().ledger.read(timer_id)
    }

    /// Adjustment attributed to the active session, 0 when idle
    pub fn active_adjustment_seconds(&self) -> i64 {
        let core = self.inner.core();
        if core.active.is_some() {
            core.adjustment
        } else {
            0
        }
    }

    /// Whether a start or stop is in flight
    pub fn is_busy(&self) -> bool {
        self.inner.core().busy
    }

    /// Register a listener called after every change
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&RuntimeSnapshot) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Arc::new(listener))
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    fn notify(&self) {
        if self.inner.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.inner.listeners.notify(&snapshot);
    }

    /// Recompute elapsed time from the clock
    ///
    /// Returns the new value. Listeners are only told when it changed.
    pub fn tick(&self) -> u64 {
        let now = self.inner.clock.now();
        let (changed, elapsed) = {
            let mut core = self.inner.core();
            let changed = core.elapsed.tick(now);
            if changed {
                self.inner.persist_session(&core);
            }
            (changed, core.elapsed.last_elapsed())
        };
        if changed {
            self.notify();
        }
        elapsed
    }

    /// Apply a manual correction to `timer_id`
    ///
    /// For the running timer the offset is clamped so that its live elapsed
    /// time plus offset stays non-negative, and the applied amount is also
    /// attributed to the active session. Returns the applied amount.
    pub fn adjust_offset(&self, timer_id: &str, delta_seconds: i64) -> i64 {
        let now = self.inner.clock.now();
        let applied = {
            let mut guard = self.inner.core();
            let core = &mut *guard;
            core.elapsed.tick(now);

            let live_elapsed = core.live_elapsed(now);
            let live = core.active.as_ref().map(|session| LiveTimer {
                timer_id: session.timer_id.as_str(),
                elapsed_seconds: live_elapsed,
            });
            let applied = core.ledger.adjust(timer_id, delta_seconds, live);
            let is_active = live.map(|l| l.timer_id == timer_id).unwrap_or(false);

            if is_active && applied != 0 {
                core.adjustment += applied;
                self.inner.persist_adjustment(core);
            }
            self.inner.persist_ledger(core);

            debug!(
                timer_id = %timer_id,
                requested = delta_seconds,
                applied,
                offset = core.ledger.read(timer_id),
                "Adjusted timer offset"
            );
            applied
        };
        self.notify();
        applied
    }

    /// Start `timer_id`, stopping whatever runs now in the same request
    ///
    /// Starting the timer that is already running does nothing. When another
    /// timer was running locally, its session adjustment rides along as the
    /// carried adjustment and its elapsed time at the switch is banked.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Busy`] if a start or stop is in flight;
    /// [`RuntimeError::Gateway`] if the request failed, in which case the
    /// runtime state is unchanged.
    pub async fn start_timer(&self, timer_id: &str) -> Result<(), RuntimeError> {
        let now = self.inner.clock.now();
        let (previous, elapsed_at_switch, carried) = {
            let mut core = self.inner.core();
            if core.busy {
                return Err(RuntimeError::Busy);
            }
            if core.active.as_ref().map(|s| s.timer_id.as_str()) == Some(timer_id) {
                debug!(timer_id = %timer_id, "Timer already running; ignoring start");
                return Ok(());
            }
            core.busy = true;
            let carried = if core.active.is_some() {
                core.adjustment
            } else {
                0
            };
            (core.active.clone(), core.live_elapsed(now), carried)
        };
        self.notify();

        let request = StartRequest {
            client_tz: self.inner.settings.time_zone.clone(),
            started_at_client: now,
            stopped_adjustment_seconds: carried,
        };
        let result = self.inner.gateway.start(timer_id, request).await;

        let outcome = {
            let mut guard = self.inner.core();
            let core = &mut *guard;
            core.busy = false;
            match result {
                Ok(response) => {
                    core.generation += 1;
                    if let Some(previous) = &previous {
                        core.ledger.bank(&previous.timer_id, elapsed_at_switch);
                    }
                    let session_id = response.active_session.id.clone();
                    core.adopt(
                        Some(response.active_session),
                        &self.inner.local,
                        self.inner.clock.now(),
                    );
                    self.inner.persist_session(core);
                    self.inner.persist_adjustment(core);
                    self.inner.persist_ledger(core);
                    info!(
                        timer_id = %timer_id,
                        session_id = %session_id,
                        carried_adjustment = carried,
                        previous_timer = previous.as_ref().map(|s| s.timer_id.as_str()).unwrap_or("-"),
                        "Timer started"
                    );
                    Ok(())
                }
                Err(e) => {
                    warn!(timer_id = %timer_id, "Start failed: {}", e);
                    Err(RuntimeError::from(e))
                }
            }
        };
        self.notify();
        outcome
    }

    /// Stop the active session
    ///
    /// The request carries the active session's adjustment. It is sent even
    /// when the runtime believes it is idle, so that a stale belief cannot
    /// keep a server-side session running.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Busy`] if a start or stop is in flight;
    /// [`RuntimeError::Gateway`] if the request failed, in which case the
    /// runtime state is unchanged.
    pub async fn stop_timer(&self) -> Result<(), RuntimeError> {
        let now = self.inner.clock.now();
        let (previous, final_elapsed, adjustment) = {
            let mut core = self.inner.core();
            if core.busy {
                return Err(RuntimeError::Busy);
            }
            core.busy = true;
            let adjustment = if core.active.is_some() {
                core.adjustment
            } else {
                0
            };
            (core.active.clone(), core.live_elapsed(now), adjustment)
        };
        self.notify();

        let request = StopRequest {
            stopped_at_client: now,
            adjustment_seconds: adjustment,
        };
        let result = self.inner.gateway.stop(request).await;

        let outcome = {
            let mut guard = self.inner.core();
            let core = &mut *guard;
            core.busy = false;
            match result {
                Ok(_) => {
                    core.generation += 1;
                    if let Some(previous) = &previous {
                        core.ledger.bank(&previous.timer_id, final_elapsed);
                    }
                    core.adopt(None, &self.inner.local, self.inner.clock.now());
                    self.inner.persist_session(core);
                    self.inner.persist_ledger(core);
                    info!(
                        timer_id = previous.as_ref().map(|s| s.timer_id.as_str()).unwrap_or("-"),
                        elapsed = final_elapsed,
                        adjustment,
                        "Timer stopped"
                    );
                    Ok(())
                }
                Err(e) => {
                    warn!("Stop failed: {}", e);
                    Err(RuntimeError::from(e))
                }
            }
        };
        self.notify();
        outcome
    }

    /// Reconcile with the server's active session
    ///
    /// The server wins: a different or missing session replaces the local
    /// belief and the clock restarts from the server's start instant. A reply
    /// that raced a start or stop is discarded.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Gateway`] if the request failed; the local state is
    /// unchanged.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RuntimeError> {
        let generation = {
            let core = self.inner.core();
            if core.busy {
                debug!("Start or stop in flight; skipping refresh");
                return Ok(RefreshOutcome::Skipped);
            }
            core.generation
        };

        let result = self.inner.gateway.fetch_active().await;

        let (outcome, should_notify) = {
            let mut guard = self.inner.core();
            let core = &mut *guard;
            let was_loading = core.loading;
            core.loading = false;

            match result {
                Ok(_) if core.busy || core.generation != generation => {
                    debug!("Start or stop overlapped refresh; discarding result");
                    (Ok(RefreshOutcome::Skipped), was_loading)
                }
                Ok(server) => {
                    let before = RuntimeState::from_session(core.active.as_ref());
                    let changed = core.adopt(server, &self.inner.local, self.inner.clock.now());
                    if changed {
                        self.inner.persist_session(core);
                        let after = RuntimeState::from_session(core.active.as_ref());
                        if before != after {
                            info!(from = %before, to = %after, "Adopted server session state");
                        }
                        (Ok(RefreshOutcome::Adopted), true)
                    } else {
                        (Ok(RefreshOutcome::Unchanged), was_loading)
                    }
                }
                Err(e) => {
                    warn!("Refresh failed: {}", e);
                    (Err(RuntimeError::from(e)), was_loading)
                }
            }
        };

        if should_notify {
            self.notify();
        }
        outcome
    }

    /// Start the tick and reconciliation tasks
    ///
    /// The reconciliation task refreshes immediately, then on every
    /// `refresh_interval`. Calling this again while the tasks run does
    /// nothing. Must be called from within a tokio runtime.
    pub fn spawn_background(&self) {
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if background.is_some() {
            return;
        }
        *background = Some(Background::spawn(self));
    }

    /// Cancel the tick and reconciliation tasks
    ///
    /// Idempotent. Requests already in flight run to completion.
    pub fn dispose(&self) {
        let background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(background) = background {
            background.cancel();
            debug!("Timer runtime background tasks cancelled");
        }
    }

    /// Whether background tasks are registered
    pub fn is_running_background(&self) -> bool {
        self.inner
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{started_ago, RecordedCall, ScriptedGateway};
    use crate::test_utils::{assert_error_contains, t0, Harness};
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn harness() -> Harness {
        Harness::new()
    }

    fn start_calls(gateway: &ScriptedGateway) -> Vec<(String, StartRequest)> {
        gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Start { timer_id, request } => Some((timer_id, request)),
                _ => None,
            })
            .collect()
    }

    fn stop_calls(gateway: &ScriptedGateway) -> Vec<StopRequest> {
        gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Stop(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_new_runtime_is_idle_and_loading() {
        let h = harness();
        let snapshot = h.runtime.snapshot();
        assert_eq!(snapshot.state, RuntimeState::Idle);
        assert!(snapshot.loading);
        assert!(!snapshot.busy);
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    #[tokio::test]
    async fn test_start_from_idle_carries_nothing() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();

        let calls = start_calls(&h.gateway);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "math");
        assert_eq!(calls[0].1.stopped_adjustment_seconds, 0);
        assert_eq!(calls[0].1.client_tz, "UTC");
        assert_eq!(calls[0].1.started_at_client, t0());
        assert!(h.runtime.state().is_running("math"));
        assert_eq!(h.runtime.active_adjustment_seconds(), 0);
    }

    #[tokio::test]
    async fn test_start_same_timer_is_noop() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::seconds(30));
        h.runtime.adjust_offset("math", 300);

        h.runtime.start_timer("math").await.unwrap();

        assert_eq!(start_calls(&h.gateway).len(), 1);
        assert_eq!(h.runtime.active_adjustment_seconds(), 300);
    }

    #[tokio::test]
    async fn test_switch_carries_adjustment_and_banks_elapsed() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::seconds(120));
        assert_eq!(h.runtime.adjust_offset("math", -60), -60);

        h.runtime.start_timer("physics").await.unwrap();

        let calls = start_calls(&h.gateway);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "physics");
        assert_eq!(calls[1].1.stopped_adjustment_seconds, -60);

        let snapshot = h.runtime.snapshot();
        assert!(snapshot.state.is_running("physics"));
        assert_eq!(snapshot.active_adjustment_seconds, 0);
        assert_eq!(snapshot.banked.get("math"), Some(&120));
        assert_eq!(snapshot.offset("math"), -60);
        assert_eq!(snapshot.total_seconds("math"), 60);
    }

    #[tokio::test]
    async fn test_stop_sends_session_adjustment_and_goes_idle() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::seconds(90));
        h.runtime.adjust_offset("math", -60);

        h.runtime.stop_timer().await.unwrap();

        let stops = stop_calls(&h.gateway);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].adjustment_seconds, -60);
        let snapshot = h.runtime.snapshot();
        assert_eq!(snapshot.state, RuntimeState::Idle);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert_eq!(snapshot.active_adjustment_seconds, 0);
        assert_eq!(snapshot.banked.get("math"), Some(&90));
        assert!(h.local.load_active_session().is_none());
    }

    #[tokio::test]
    async fn test_stop_while_idle_still_sends_request() {
        let h = harness();
        h.runtime.stop_timer().await.unwrap();
        let stops = stop_calls(&h.gateway);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].adjustment_seconds, 0);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_state_untouched() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::seconds(50));
        h.runtime.adjust_offset("math", 300);
        let before = h.runtime.snapshot();

        h.gateway.fail_next(404, "timer_not_found");
        let result = h.runtime.start_timer("physics").await;

        assert!(matches!(result, Err(RuntimeError::Gateway(_))));
        assert_error_contains(result, "timer_not_found");
        let after = h.runtime.snapshot();
        assert_eq!(after, before);
        assert!(!after.busy);
    }

    #[tokio::test]
    async fn test_failed_stop_leaves_state_untouched() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.gateway.fail_next_malformed("expected value at line 1");

        assert!(h.runtime.stop_timer().await.is_err());
        assert!(h.runtime.state().is_running("math"));
        assert!(!h.runtime.is_busy());
    }

    #[tokio::test]
    async fn test_concurrent_start_rejected_while_busy() {
        let h = harness();
        h.gateway.pause();

        let runtime = h.runtime.clone();
        let pending = tokio::spawn(async move { runtime.start_timer("math").await });
        while !h.runtime.is_busy() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            h.runtime.start_timer("physics").await,
            Err(RuntimeError::Busy)
        ));
        assert!(matches!(h.runtime.stop_timer().await, Err(RuntimeError::Busy)));
        assert_eq!(
            h.runtime.refresh().await.unwrap(),
            RefreshOutcome::Skipped
        );

        h.gateway.resume();
        pending.await.unwrap().unwrap();
        assert!(!h.runtime.is_busy());
        assert!(h.runtime.state().is_running("math"));
        assert_eq!(start_calls(&h.gateway).len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_adopts_server_session_from_its_start_instant() {
        let h = harness();
        h.clock.advance(ChronoDuration::seconds(300));
        let server_session = started_ago(Session::running("sid-7", "physics", h.clock.now()), 45);
        h.gateway.set_active(Some(server_session.clone()));

        let outcome = h.runtime.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Adopted);
        assert_eq!(
            h.runtime.state(),
            RuntimeState::Running {
                timer_id: "physics".into(),
                session_id: "sid-7".into()
            }
        );
        assert_eq!(h.runtime.elapsed_seconds(), 45);
        assert!(!h.runtime.snapshot().loading);
    }

    #[tokio::test]
    async fn test_refresh_after_stop_is_noop() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.runtime.stop_timer().await.unwrap();
        let before = h.runtime.snapshot();

        assert_eq!(h.runtime.refresh().await.unwrap(), RefreshOutcome::Unchanged);
        let after = h.runtime.snapshot();
        assert_eq!(after.state, RuntimeState::Idle);
        assert_eq!(after.offsets, before.offsets);
        assert_eq!(after.banked, before.banked);
    }

    #[tokio::test]
    async fn test_refresh_drops_session_stopped_elsewhere() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.gateway.set_active(None);

        assert_eq!(h.runtime.refresh().await.unwrap(), RefreshOutcome::Adopted);
        assert_eq!(h.runtime.state(), RuntimeState::Idle);
        assert_eq!(h.runtime.active_adjustment_seconds(), 0);
    }

    async fn wait_for_fetch(gateway: &ScriptedGateway) {
        while !gateway.calls().contains(&RecordedCall::FetchActive) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_refresh_reply_older_than_start_is_discarded() {
        let h = harness();
        h.gateway.hold_fetches();
        let runtime = h.runtime.clone();
        let pending = tokio::spawn(async move { runtime.refresh().await });
        wait_for_fetch(&h.gateway).await;

        h.runtime.start_timer("math").await.unwrap();
        h.gateway.release_fetches();

        assert_eq!(pending.await.unwrap().unwrap(), RefreshOutcome::Skipped);
        assert!(h.runtime.state().is_running("math"));

        h.clock.advance(ChronoDuration::seconds(20));
        assert_eq!(h.runtime.tick(), 20);
        assert_eq!(h.runtime.adjust_offset("math", -50), -20);
        h.runtime.stop_timer().await.unwrap();
        assert_eq!(stop_calls(&h.gateway)[0].adjustment_seconds, -20);
    }

    #[tokio::test]
    async fn test_refresh_reply_older_than_stop_is_discarded() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.gateway.hold_fetches();
        let runtime = h.runtime.clone();
        let pending = tokio::spawn(async move { runtime.refresh().await });
        wait_for_fetch(&h.gateway).await;

        h.runtime.stop_timer().await.unwrap();
        h.gateway.release_fetches();

        assert_eq!(pending.await.unwrap().unwrap(), RefreshOutcome::Skipped);
        assert_eq!(h.runtime.state(), RuntimeState::Idle);
        assert!(h.local.load_active_session().is_none());
    }

    #[tokio::test]
    async fn test_refresh_drops_stored_adjustment_of_ended_session() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        let session_id = h.runtime.snapshot().active_session.unwrap().id;
        h.runtime.adjust_offset("math", 30);
        assert_eq!(h.local.session_adjustment(&session_id), 30);

        h.gateway
            .set_active(Some(Session::running("elsewhere", "physics", h.clock.now())));
        assert_eq!(h.runtime.refresh().await.unwrap(), RefreshOutcome::Adopted);

        assert_eq!(h.local.session_adjustment(&session_id), 0);
        assert!(!h.local.load_session_adjustments().contains_key(&session_id));
        assert_eq!(h.runtime.active_adjustment_seconds(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_state() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.gateway.fail_next(503, "Service Unavailable");

        assert!(h.runtime.refresh().await.is_err());
        assert!(h.runtime.state().is_running("math"));
    }

    #[tokio::test]
    async fn test_adjust_clamps_only_active_timer() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::seconds(40));

        assert_eq!(h.runtime.adjust_offset("math", -1000), -40);
        assert_eq!(h.runtime.offset("math"), -40);
        assert_eq!(h.runtime.active_adjustment_seconds(), -40);

        assert_eq!(h.runtime.adjust_offset("art", -1000), -1000);
        assert_eq!(h.runtime.offset("art"), -1000);
        assert_eq!(h.runtime.active_adjustment_seconds(), -40);
    }

    #[tokio::test]
    async fn test_tick_recomputes_from_clock() {
        let h = harness();
        h.runtime.start_timer("math").await.unwrap();
        h.clock.advance(ChronoDuration::milliseconds(2500));
        assert_eq!(h.runtime.tick(), 2);
        h.clock.advance(ChronoDuration::hours(2));
        assert_eq!(h.runtime.tick(), 7202);
    }

    #[tokio::test]
    async fn test_listeners_see_each_change() {
        let h = harness();
        let seen = Arc::new(Mutex::new(Vec::<RuntimeSnapshot>::new()));
        let sink = seen.clone();
        let id = h.runtime.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        });

        h.runtime.start_timer("math").await.unwrap();
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(seen[0].busy);
            assert!(!seen[1].busy);
            assert!(seen[1].state.is_running("math"));
        }

        h.clock.advance(ChronoDuration::seconds(1));
        h.runtime.tick();
        // Same second again: no change, no notification.
        h.runtime.tick();
        assert_eq!(seen.lock().unwrap().len(), 3);

        assert!(h.runtime.unsubscribe(id));
        h.runtime.adjust_offset("math", 60);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unchanged_refresh_does_not_notify() {
        let h = harness();
        h.runtime.refresh().await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        h.runtime.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        h.runtime.refresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_instances_do_not_share_state() {
        let a = harness();
        let b = harness();
        a.runtime.adjust_offset("math", 120);
        assert_eq!(a.runtime.offset("math"), 120);
        assert_eq!(b.runtime.offset("math"), 0);
    }
}
