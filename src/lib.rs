//! coursetimers - study timer client library
//!
//! This library keeps a single authoritative "what is being timed right
//! now" state per user in sync with a remote session service, while layering
//! local manual corrections on top of measured time.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `runtime`: The timer runtime controller, its snapshots and listeners
//! - `gateway`: Remote session service client (HTTP) and an in-process fake
//! - `clock`: Time sources and the elapsed clock
//! - `ledger`: Per-timer offsets and banked elapsed time
//! - `storage`: Local key-value persistence
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` and `commands`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coursetimers::clock::SystemClock;
//! use coursetimers::gateway::http::HttpSessionGateway;
//! use coursetimers::runtime::TimerRuntime;
//! use coursetimers::storage::LocalState;
//! use coursetimers::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let gateway = HttpSessionGateway::new(config.gateway_config(Some("ada".into())))?;
//!     let runtime = TimerRuntime::new(
//!         Arc::new(gateway),
//!         LocalState::in_memory(),
//!         Arc::new(SystemClock),
//!         config.runtime_settings(),
//!     );
//!     runtime.refresh().await?;
//!     runtime.start_timer("math").await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod duration;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod runtime;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{CourseTimersError, GatewayError, Result, RuntimeError};
pub use runtime::{RuntimeSnapshot, RuntimeState, TimerRuntime};

#[cfg(test)]
pub mod test_utils;
