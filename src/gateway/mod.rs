//! Session backend abstraction
//!
//! This module defines the [`SessionGateway`] trait the timer runtime uses to
//! read and mutate the server-side active session, and the wire types of the
//! backend's session endpoints. Implementations live in submodules:
//!
//! - [`http::HttpSessionGateway`] -- talks to the backend over HTTP/JSON.
//! - [`fake::ScriptedGateway`] -- in-process gateway with scripted replies and
//!   a request log, for tests and offline demos.
//!
//! # Design
//!
//! The server is authoritative. `start` must stop any active session and
//! start the new one in a single server-side transaction; the client issues
//! exactly one request per operation and never retries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub mod fake;
pub mod http;

/// A tracked interval of time on one timer
///
/// `end_at` is absent while the session is running. The remaining fields are
/// informational and optional on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned session id
    pub id: String,
    /// Timer the session belongs to
    pub timer_id: String,
    /// Start instant
    pub start_at: DateTime<Utc>,
    /// End instant, absent while running
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Recorded duration once ended
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    /// Time zone the session was started from
    #[serde(default)]
    pub client_tz: Option<String>,
    /// Local calendar day of the start
    #[serde(default)]
    pub day_date: Option<NaiveDate>,
    /// Local weekday of the start, Monday = 0
    #[serde(default)]
    pub day_of_week: Option<u8>,
}

impl Session {
    /// Build a running session with only the required fields set
    pub fn running(
        id: impl Into<String>,
        timer_id: impl Into<String>,
        start_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            timer_id: timer_id.into(),
            start_at,
            end_at: None,
            duration_seconds: None,
            client_tz: None,
            day_date: None,
            day_of_week: None,
        }
    }

    /// Whether the session is still running
    pub fn is_active(&self) -> bool {
        self.end_at.is_none()
    }
}

/// Body of `GET /active-session`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveSessionResponse {
    /// The running session, if any
    #[serde(default)]
    pub active_session: Option<Session>,
}

/// Body of `POST /timers/{id}/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// IANA time zone of the client
    pub client_tz: String,
    /// Client-side start instant
    pub started_at_client: DateTime<Utc>,
    /// Correction applied to the session being stopped
    pub stopped_adjustment_seconds: i64,
}

/// Reply to a start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    /// Session stopped by this request, if one was running
    #[serde(default)]
    pub stopped_session: Option<Session>,
    /// The newly active session
    pub active_session: Session,
}

/// Body of `POST /stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRequest {
    /// Client-side stop instant
    pub stopped_at_client: DateTime<Utc>,
    /// Correction applied to the stopped session's duration
    pub adjustment_seconds: i64,
}

/// Reply to a stop request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopResponse {
    /// Session that was stopped, absent if nothing was running
    #[serde(default)]
    pub stopped_session: Option<Session>,
}

/// Remote source of truth for the active session
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    /// Current server-side active session
    async fn fetch_active(&self) -> Result<Option<Session>, GatewayError>;

    /// Stop whatever is running and start `timer_id`, atomically
    async fn start(
        &self,
        timer_id: &str,
        request: StartRequest,
    ) -> Result<StartResponse, GatewayError>;

    /// End the active session
    async fn stop(&self, request: StopRequest) -> Result<StopResponse, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_deserializes_backend_shape() {
        let json = r#"{
            "id": "0b6f2a4e-8d0e-4d4a-9d8a-1f0e3d7d9c11",
            "timer_id": "math",
            "start_at": "2025-03-10T08:00:00Z",
            "end_at": null,
            "duration_seconds": null,
            "client_tz": "Europe/Berlin",
            "day_date": "2025-03-10",
            "day_of_week": 0
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.timer_id, "math");
        assert!(session.is_active());
        assert_eq!(
            session.start_at,
            Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(session.day_of_week, Some(0));
    }

    #[test]
    fn test_session_minimal_shape() {
        let json = r#"{"id":"s1","timer_id":"t1","start_at":"2025-03-10T08:00:00+01:00"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(
            session.start_at,
            Utc.with_ymd_and_hms(2025, 3, 10, 7, 0, 0).unwrap()
        );
        assert!(session.client_tz.is_none());
    }

    #[test]
    fn test_start_request_serialization() {
        let request = StartRequest {
            client_tz: "UTC".to_string(),
            started_at_client: Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap(),
            stopped_adjustment_seconds: -60,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["client_tz"], "UTC");
        assert_eq!(json["stopped_adjustment_seconds"], -60);
        assert_eq!(json["started_at_client"], "2025-03-10T08:00:00Z");
    }

    #[test]
    fn test_active_session_response_null() {
        let response: ActiveSessionResponse =
            serde_json::from_str(r#"{"active_session": null}"#).unwrap();
        assert!(response.active_session.is_none());
    }
}
