// Reader/lane status tracker
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Lane identifier as configured ("1", "2", "3", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneId(String);

impl LaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reader name used by the backend: "reader{N}"
    pub fn reader_name(&self) -> String {
        format!("reader{}", self.0)
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LaneId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LaneId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reader state as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderStatus {
    #[default]
    Unknown,
    Idle,
    Running,
    Error,
}

impl ReaderStatus {
    /// Parse a reported status. `unknown` is never reported, only initial.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "idle" => Some(ReaderStatus::Idle),
            "running" => Some(ReaderStatus::Running),
            "error" => Some(ReaderStatus::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReaderStatus::Unknown => "unknown",
            ReaderStatus::Idle => "idle",
            ReaderStatus::Running => "running",
            ReaderStatus::Error => "error",
        }
    }
}

/// Per-lane state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneState {
    pub lane: LaneId,
    pub status: ReaderStatus,
    pub is_reading: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub assigned_logistic_id: Option<String>,
}

impl LaneState {
    pub fn new(lane: LaneId) -> Self {
        Self {
            lane,
            status: ReaderStatus::Unknown,
            is_reading: false,
            last_update: None,
            assigned_logistic_id: None,
        }
    }

    /// No shipment assigned
    pub fn is_free(&self) -> bool {
        self.assigned_logistic_id.is_none()
    }

    fn apply(&mut self, payload: &Value, now: DateTime<Utc>) {
        let fields = payload.as_object();

        if let Some(status) = fields
            .and_then(|f| f.get("status"))
            .and_then(Value::as_str)
            .and_then(ReaderStatus::parse)
        {
            self.status = status;
        }
        self.is_reading = self.status == ReaderStatus::Running;
        self.last_update = Some(now);

        match fields.and_then(|f| f.get("logisticId")) {
            Some(Value::String(id)) if !id.is_empty() => {
                self.assigned_logistic_id = Some(id.clone());
            }
            Some(Value::Number(n)) => self.assigned_logistic_id = Some(n.to_string()),
            _ => {}
        }
    }
}

/// Tracks the configured lanes, in configured order
#[derive(Debug, Clone)]
pub struct LaneTracker {
    lanes: Vec<LaneState>,
}

impl LaneTracker {
    pub fn new<I, L>(lanes: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LaneId>,
    {
        let mut states: Vec<LaneState> = Vec::new();
        for lane in lanes {
            let lane = lane.into();
            if !states.iter().any(|s| s.lane == lane) {
                states.push(LaneState::new(lane));
            }
        }
        Self { lanes: states }
    }

    /// Apply a status message. Unconfigured lanes are ignored.
    pub fn apply_status(
        &mut self,
        lane: &LaneId,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Option<&LaneState> {
        let Some(state) = self.lanes.iter_mut().find(|s| &s.lane == lane) else {
            debug!(target: "lanes", %lane, "Status for unconfigured lane ignored");
            return None;
        };
        state.apply(payload, now);
        debug!(
            target: "lanes",
            %lane,
            status = state.status.as_str(),
            logistic_id = ?state.assigned_logistic_id,
            "Lane status updated"
        );
        Some(&*state)
    }

    pub fn lane(&self, lane: &LaneId) -> Option<&LaneState> {
        self.lanes.iter().find(|s| &s.lane == lane)
    }

    pub fn is_configured(&self, lane: &LaneId) -> bool {
        self.lane(lane).is_some()
    }

    pub fn lanes(&self) -> &[LaneState] {
        &self.lanes
    }

    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.lanes.iter().map(|s| s.lane.clone()).collect()
    }
}

impl Default for LaneTracker {
    fn default() -> Self {
        Self::new(["1", "2", "3"])
    }
}
