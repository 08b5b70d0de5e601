//! Command handlers for the CLI
//!
//! Each handler opens local state, builds a [`TimerRuntime`] over the HTTP
//! gateway and drives it. Handlers print to stdout; logs go to stderr.

use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::{validate_username, Config};
use crate::error::{CourseTimersError, Result};
use crate::gateway::http::HttpSessionGateway;
use crate::runtime::TimerRuntime;
use crate::storage::{LocalState, SledStore};

pub mod login;
pub mod status;
pub mod timer;
pub mod watch;

/// Open the on-disk state named by `config`
///
/// # Errors
///
/// Returns error if the state directory cannot be resolved or opened
pub fn open_local_state(config: &Config) -> Result<LocalState> {
    let path = config.state_path()?;
    tracing::debug!("Opening local state at {}", path.display());
    let store = SledStore::open(&path)?;
    Ok(LocalState::new(Arc::new(store), config.storage.namespace.clone()))
}

/// Username to act as: configured override first, then the stored one
///
/// # Errors
///
/// Returns [`CourseTimersError::InvalidUsername`] when neither is set or
/// the configured one is invalid
pub fn resolve_username(config: &Config, local: &LocalState) -> Result<String> {
    match &config.username {
        Some(name) => validate_username(name),
        None => local.username().ok_or_else(|| {
            CourseTimersError::InvalidUsername(
                "no username set; run `coursetimers login <username>` first".to_string(),
            )
            .into()
        }),
    }
}

/// Build a runtime talking to the configured backend as the current user
///
/// # Errors
///
/// Returns error if no username is available or the gateway cannot be built
pub fn build_runtime(config: &Config, local: LocalState) -> Result<TimerRuntime> {
    let username = resolve_username(config, &local)?;
    let gateway = HttpSessionGateway::new(config.gateway_config(Some(username)))?;
    Ok(TimerRuntime::new(
        Arc::new(gateway),
        local,
        Arc::new(SystemClock),
        config.runtime_settings(),
    ))
}

/// Refresh, logging rather than failing when the backend is unreachable
///
/// Returns whether the refresh succeeded.
pub async fn refresh_or_warn(runtime: &TimerRuntime) -> bool {
    match runtime.refresh().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Could not reach the session service: {}", e);
            false
        }
    }
}
