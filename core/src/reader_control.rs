//! Reader control client
//!
//! Start/stop reading on a lane and start status polling, via the backend's
//! HTTP API. Requests are fire-and-forget from the caller's point of view:
//! responses are only logged and failures are never retried.
use crate::lane::LaneId;
use crate::{EmbarqueError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const START_READING_PATH: &str = "/api/lector/iniciar";
pub const STOP_READING_PATH: &str = "/api/lector/detener";
pub const START_POLLING_PATH: &str = "/api/lector/iniciarPolling";

/// Configuration for the reader control client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderControlConfig {
    /// Backend base URL
    pub base_url: String,
    /// Reading profile sent when the caller does not name one
    pub default_profile: String,
    /// Timeout for each request in milliseconds
    pub timeout_ms: u64,
}

impl Default for ReaderControlConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("EMBARQUE_BACKEND_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            default_profile: std::env::var("EMBARQUE_READER_PROFILE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "TEST".to_string()),
            timeout_ms: 10_000,
        }
    }
}

/// Outbound control surface of the physical readers
#[async_trait]
pub trait ReaderControl: Send + Sync {
    async fn start_reading(&self, lane: &LaneId, profile: Option<&str>) -> Result<Value>;
    async fn stop_reading(&self, lane: &LaneId) -> Result<Value>;
    async fn start_polling(&self) -> Result<Value>;
}

/// A control request to be sent without waiting on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    StartReading {
        lane: LaneId,
        profile: Option<String>,
    },
    StopReading {
        lane: LaneId,
    },
    StartPolling,
}

impl ControlCommand {
    fn label(&self) -> &'static str {
        match self {
            ControlCommand::StartReading { .. } => "start_reading",
            ControlCommand::StopReading { .. } => "stop_reading",
            ControlCommand::StartPolling => "start_polling",
        }
    }
}

/// Send a command in the background. The outcome is logged, never surfaced.
pub fn dispatch_control(control: Arc<dyn ReaderControl>, command: ControlCommand) -> JoinHandle<()> {
    tokio::spawn(async move {
        let label = command.label();
        let result = match &command {
            ControlCommand::StartReading { lane, profile } => {
                control.start_reading(lane, profile.as_deref()).await
            }
            ControlCommand::StopReading { lane } => control.stop_reading(lane).await,
            ControlCommand::StartPolling => control.start_polling().await,
        };
        match result {
            Ok(response) => {
                info!(target: "reader_control", command = label, %response, "Reader control response")
            }
            Err(e) => {
                warn!(target: "reader_control", command = label, error = %e, "Reader control request failed")
            }
        }
    })
}

/// HTTP implementation against the reader backend
pub struct HttpReaderControl {
    config: ReaderControlConfig,
    http_client: reqwest::Client,
}

impl HttpReaderControl {
    pub fn new(config: ReaderControlConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EmbarqueError::ReaderControl(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ReaderControlConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.url(path);
        debug!(target: "reader_control", %url, body = ?body, "POST");

        let mut request = self.http_client.post(&url);
        request = match body {
            Some(body) => request.json(&body),
            None => request.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| EmbarqueError::ReaderControl(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbarqueError::ReaderControl(format!("{} returned HTTP {}", url, status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EmbarqueError::ReaderControl(format!("{}: invalid response body: {}", url, e)))
    }
}

#[async_trait]
impl ReaderControl for HttpReaderControl {
    async fn start_reading(&self, lane: &LaneId, profile: Option<&str>) -> Result<Value> {
        let profile = profile.unwrap_or(self.config.default_profile.as_str());
        self.post(
            START_READING_PATH,
            Some(json!({ "lectorId": lane.reader_name(), "perfil": profile })),
        )
        .await
    }

    async fn stop_reading(&self, lane: &LaneId) -> Result<Value> {
        self.post(STOP_READING_PATH, Some(json!({ "lectorId": lane.reader_name() })))
            .await
    }

    async fn start_polling(&self) -> Result<Value> {
        self.post(START_POLLING_PATH, None).await
    }
}
