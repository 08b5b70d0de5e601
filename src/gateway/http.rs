//! HTTP gateway to the coursetimers backend.
//!
//! Every request carries an `X-Username` header when a username is set.
//! Non-success statuses become [`GatewayError::Status`] with the message read
//! from the body; a 204 or empty 2xx body is "no content".
//!
//! # Example
//!
//! ```rust,no_run
//! use coursetimers::gateway::http::{HttpGatewayConfig, HttpSessionGateway};
//! use coursetimers::gateway::SessionGateway;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = HttpSessionGateway::new(HttpGatewayConfig {
//!         base_url: "http://localhost:8000/api".to_string(),
//!         username: Some("ada".to_string()),
//!         timeout_secs: 30,
//!     })?;
//!
//!     if let Some(session) = gateway.fetch_active().await? {
//!         println!("{} is running", session.timer_id);
//!     }
//!     Ok(())
//! }
//! ```

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::error::{CourseTimersError, GatewayError, Result};
use crate::gateway::{
    ActiveSessionResponse, Session, SessionGateway, StartRequest, StartResponse, StopRequest,
    StopResponse,
};

/// Header carrying the username tag
pub const USERNAME_HEADER: &str = "X-Username";

/// HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the backend API, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Username tag sent with every request.
    pub username: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Session gateway over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpSessionGateway {
    client: Client,
    base_url: Url,
    username: Option<String>,
}

impl HttpSessionGateway {
    /// Creates a new gateway.
    ///
    /// # Errors
    ///
    /// Returns `CourseTimersError::Config` if the base URL is invalid, or an
    /// HTTP error if the client cannot be built.
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            CourseTimersError::Config(format!("Invalid API base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CourseTimersError::Config(format!(
                "API base URL cannot carry paths: {}",
                config.base_url
            ))
            .into());
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let username = config
            .username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            client,
            base_url,
            username,
        })
    }

    /// Builds the URL for a path made of `segments` below the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds a request with the identity header.
    fn build_request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "Sending session request");
        let request = self.client.request(method, url);
        match &self.username {
            Some(username) => request.header(USERNAME_HEADER, username),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn fetch_active(&self) -> std::result::Result<Option<Session>, GatewayError> {
        let response = self
            .build_request(Method::GET, &["active-session"])
            .send()
            .await?;

        let body: Option<ActiveSessionResponse> = read_body(response).await?;
        Ok(body.and_then(|b| b.active_session))
    }

    async fn start(
        &self,
        timer_id: &str,
        request: StartRequest,
    ) -> std::result::Result<StartResponse, GatewayError> {
        let response = self
            .build_request(Method::POST, &["timers", timer_id, "start"])
            .json(&request)
            .send()
            .await?;

        let body: Option<StartResponse> = read_body(response).await?;
        let body = body.ok_or_else(|| {
            GatewayError::Malformed("start response carried no active session".to_string())
        })?;

        debug!(
            timer_id = %timer_id,
            session_id = %body.active_session.id,
            stopped = body.stopped_session.as_ref().map(|s| s.id.as_str()).unwrap_or("-"),
            "Started timer"
        );
        Ok(body)
    }

    async fn stop(&self, request: StopRequest) -> std::result::Result<StopResponse, GatewayError> {
        let response = self
            .build_request(Method::POST, &["stop"])
            .json(&request)
            .send()
            .await?;

        let body: StopResponse = read_body(response).await?.unwrap_or_default();
        debug!(
            stopped = body.stopped_session.as_ref().map(|s| s.id.as_str()).unwrap_or("-"),
            "Stopped active session"
        );
        Ok(body)
    }
}

/// Decodes a JSON body, mapping failures onto [`GatewayError`].
///
/// Returns `Ok(None)` for 204 and for empty 2xx bodies.
async fn read_body<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<Option<T>, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = failure_message(status, &body);
        error!(status = status.as_u16(), message = %message, "Session request failed");
        return Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        });
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| GatewayError::Malformed(e.to_string()))
}

/// Human-readable message for a failed response.
///
/// A JSON body with a string `detail` yields that string; any other body is
/// used as-is; an empty body falls back to the status reason.
fn failure_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
            return detail.to_string();
        }
    }

    trimmed.to_string()
}
