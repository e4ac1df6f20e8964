// Dashboard module - state snapshots and live updates for the display layer
//
// Provides a small HTTP server with JSON snapshots, SSE streaming of state
// changes, and the reader control triggers.

mod api;
mod event_stream;

pub use api::DashboardServer;
pub use event_stream::{DashboardEvent, DashboardEventType, EventBroadcaster};

use serde::{Deserialize, Serialize};

/// Dashboard configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    pub host: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 3030,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("EMBARQUE_DASHBOARD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            port: std::env::var("EMBARQUE_DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3030),
            host: std::env::var("EMBARQUE_DASHBOARD_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
