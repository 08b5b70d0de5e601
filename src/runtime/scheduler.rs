//! Background tick and reconciliation tasks
//!
//! Both tasks hold only a weak reference to the runtime, so dropping every
//! [`TimerRuntime`] handle ends them as well. [`Background::cancel`] stops
//! them at their next await point.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::runtime::{Inner, TimerRuntime};

/// Tasks owned by one runtime
pub(crate) struct Background {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Background {
    pub(crate) fn spawn(runtime: &TimerRuntime) -> Self {
        let token = CancellationToken::new();
        let settings = runtime.settings();

        let handles = vec![
            spawn_tick_loop(
                runtime.downgrade(),
                settings.tick_interval,
                token.child_token(),
            ),
            spawn_refresh_loop(
                runtime.downgrade(),
                settings.refresh_interval,
                token.child_token(),
            ),
        ];
        tracing::debug!(
            tick_ms = settings.tick_interval.as_millis() as u64,
            refresh_secs = settings.refresh_interval.as_secs(),
            "Started timer runtime background tasks"
        );

        Self { token, handles }
    }

    pub(crate) fn cancel(self) {
        self.token.cancel();
        // Handles are detached; each task exits on its own once cancelled.
        drop(self.handles);
    }
}

fn upgrade(inner: &Weak<Inner>) -> Option<TimerRuntime> {
    inner.upgrade().map(TimerRuntime::from_inner)
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn spawn_tick_loop(
    inner: Weak<Inner>,
    period: Duration,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                _ = ticker.tick() => {
                    let Some(runtime) = upgrade(&inner) else { break };
                    runtime.tick();
                }
            }
        }
        tracing::trace!("Tick loop stopped");
    })
}

fn spawn_refresh_loop(
    inner: Weak<Inner>,
    period: Duration,
    cancellation: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The first tick completes immediately, which doubles as the
        // startup refresh.
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                _ = ticker.tick() => {
                    let Some(runtime) = upgrade(&inner) else { break };
                    tokio::select! {
                        biased;

                        _ = cancellation.cancelled() => break,

                        result = runtime.refresh() => {
                            if let Err(e) = result {
                                tracing::debug!("Background refresh failed: {}", e);
                            }
                        }
                    }
                }
            }
        }
        tracing::trace!("Refresh loop stopped");
    })
}
