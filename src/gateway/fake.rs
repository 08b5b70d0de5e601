//! In-process session backend for tests and offline runs
//!
//! [`ScriptedGateway`] keeps a server-side active session in memory and
//! behaves like the real backend: `start` stops whatever is running and opens
//! a new session, starting the already-running timer returns it unchanged,
//! and `stop` ends the active session. Tests can additionally
//!
//! - queue failures with [`ScriptedGateway::fail_next`],
//! - hold calls in flight with [`ScriptedGateway::pause`] /
//!   [`ScriptedGateway::resume`],
//! - delay `fetch_active` replies, already computed, with
//!   [`ScriptedGateway::hold_fetches`] / [`ScriptedGateway::release_fetches`],
//! - inspect every request with [`ScriptedGateway::calls`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use coursetimers::clock::ManualClock;
//! use coursetimers::gateway::fake::{RecordedCall, ScriptedGateway};
//! use coursetimers::gateway::{SessionGateway, StopRequest};
//!
//! # tokio_test::block_on(async {
//! let gateway = ScriptedGateway::new(Arc::new(ManualClock::new(Utc::now())));
//! let reply = gateway
//!     .stop(StopRequest { stopped_at_client: Utc::now(), adjustment_seconds: 0 })
//!     .await
//!     .unwrap();
//! assert!(reply.stopped_session.is_none());
//! assert!(matches!(gateway.calls()[0], RecordedCall::Stop(_)));
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;

use crate::clock::Clock;
use crate::error::GatewayError;
use crate::gateway::{
    Session, SessionGateway, StartRequest, StartResponse, StopRequest, StopResponse,
};

/// A request observed by the gateway
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `fetch_active`
    FetchActive,
    /// `start` for a timer
    Start {
        /// Timer being started
        timer_id: String,
        /// Request body
        request: StartRequest,
    },
    /// `stop`
    Stop(StopRequest),
}

#[derive(Debug, Default)]
struct ServerState {
    active: Option<Session>,
    next_id: u64,
    failures: VecDeque<GatewayError>,
    calls: Vec<RecordedCall>,
}

/// In-memory stand-in for the session backend
pub struct ScriptedGateway {
    clock: Arc<dyn Clock>,
    state: Mutex<ServerState>,
    paused: watch::Sender<bool>,
    fetches_held: watch::Sender<bool>,
}

impl ScriptedGateway {
    /// Create a backend with no active session
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (paused, _) = watch::channel(false);
        let (fetches_held, _) = watch::channel(false);
        Self {
            clock,
            state: Mutex::new(ServerState::default()),
            paused,
            fetches_held,
        }
    }

    /// Replace the server-side active session
    pub fn set_active(&self, session: Option<Session>) {
        self.lock().active = session;
    }

    /// Current server-side active session
    pub fn active(&self) -> Option<Session> {
        self.lock().active.clone()
    }

    /// Make the next call fail with an HTTP-style error
    pub fn fail_next(&self, status: u16, message: impl Into<String>) {
        self.lock().failures.push_back(GatewayError::Status {
            status,
            message: message.into(),
        });
    }

    /// Make the next call fail with an undecodable response
    pub fn fail_next_malformed(&self, message: impl Into<String>) {
        self.lock()
            .failures
            .push_back(GatewayError::Malformed(message.into()));
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Hold subsequent calls in flight until [`ScriptedGateway::resume`]
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release held calls
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Answer `fetch_active` at request time but hold the reply until
    /// [`ScriptedGateway::release_fetches`]
    pub fn hold_fetches(&self) {
        self.fetches_held.send_replace(true);
    }

    /// Deliver held `fetch_active` replies
    pub fn release_fetches(&self) {
        self.fetches_held.send_replace(false);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_until_resumed(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives as long as `self`, so this only ends on resume.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// Record the call and pop a queued failure, if any
    fn begin(&self, call: RecordedCall) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn end_active(state: &mut ServerState, at: DateTime<Utc>, adjustment: i64) -> Option<Session> {
        let mut session = state.active.take()?;
        let measured = (at - session.start_at).num_seconds().max(0);
        session.end_at = Some(at.max(session.start_at));
        session.duration_seconds = Some((measured + adjustment).max(0));
        Some(session)
    }
}

#[async_trait::async_trait]
impl SessionGateway for ScriptedGateway {
    async fn fetch_active(&self) -> Result<Option<Session>, GatewayError> {
        self.wait_until_resumed().await;
        self.begin(RecordedCall::FetchActive)?;
        let reply = self.active();

        let mut held = self.fetches_held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        Ok(reply)
    }

    async fn start(
        &self,
        timer_id: &str,
        request: StartRequest,
    ) -> Result<StartResponse, GatewayError> {
        self.wait_until_resumed().await;
        self.begin(RecordedCall::Start {
            timer_id: timer_id.to_string(),
            request: request.clone(),
        })?;

        let now = self.clock.now();
        let mut state = self.lock();

        if let Some(active) = state.active.as_ref().filter(|s| s.timer_id == timer_id) {
            return Ok(StartResponse {
                stopped_session: None,
                active_session: active.clone(),
            });
        }

        let stopped_session =
            Self::end_active(&mut state, now, request.stopped_adjustment_seconds);

        state.next_id += 1;
        let mut session = Session::running(format!("session-{}", state.next_id), timer_id, now);
        session.client_tz = Some(request.client_tz);
        state.active = Some(session.clone());

        Ok(StartResponse {
            stopped_session,
            active_session: session,
        })
    }

    async fn stop(&self, request: StopRequest) -> Result<StopResponse, GatewayError> {
        self.wait_until_resumed().await;
        self.begin(RecordedCall::Stop(request.clone()))?;

        let now = self.clock.now();
        let mut state = self.lock();
        Ok(StopResponse {
            stopped_session: Self::end_active(&mut state, now, request.adjustment_seconds),
        })
    }
}

/// Shift a session's start back by `seconds`, for building fixtures
pub fn started_ago(mut session: Session, seconds: i64) -> Session {
    session.start_at -= Duration::seconds(seconds);
    session
}
