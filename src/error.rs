//! Error types for coursetimers
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.
//!
//! Runtime operations return typed errors ([`RuntimeError`],
//! [`GatewayError`]) so callers can match on them. The application shell
//! (configuration, CLI commands) works with [`Result`], an `anyhow` alias.

use thiserror::Error;

/// Error type for the application shell
///
/// Covers configuration loading, local file IO, and input validation
/// performed before the timer runtime is involved.
#[derive(Error, Debug)]
pub enum CourseTimersError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A username was missing or failed validation
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// A time delta could not be parsed
    #[error("Invalid time delta: {0}")]
    InvalidDelta(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures talking to the session backend
///
/// Transport failures, non-success statuses and undecodable bodies are kept
/// apart here for logging. The runtime reports all of them the same way.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network or transport failure.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status with the message read from the body.
    #[error("{message} (HTTP {status})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the response body, or the status reason.
        message: String,
    },

    /// Response body could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Errors surfaced by timer runtime operations
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The backend call failed; the runtime state is unchanged.
    #[error("Operation failed: {0}")]
    Gateway(#[from] GatewayError),

    /// A start or stop request is already in flight.
    #[error("Another start or stop request is still in progress")]
    Busy,
}

/// Errors raised inside the local persistence layer
///
/// These never escape the adapter; they are logged and swallowed.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Embedded database failure
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    /// Stored value could not be encoded or decoded
    #[error("Stored value error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Storage location could not be prepared
    #[error("Storage location error: {0}")]
    Location(String),
}

/// Result type alias for application-shell operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
