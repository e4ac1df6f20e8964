// Loading progress for the shipment currently at the dock
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

/// Scan history entries kept for display
pub const SCAN_HISTORY_LIMIT: usize = 10;

/// Progress added per verified scan, in percent
pub const PROGRESS_STEP: u8 = 5;

/// Shipment being loaded and the tag that identifies it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentConfig {
    pub logistic_id: String,
    pub expected_tag: String,
    #[serde(default = "default_dock")]
    pub dock_number: u32,
    #[serde(default)]
    pub initial_progress: u8,
}

fn default_dock() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRecord {
    pub at: DateTime<Utc>,
    pub status: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentProgress {
    pub logistic_id: String,
    pub expected_tag: String,
    pub dock_number: u32,
    pub loading_progress: u8,
    pub last_scan: Option<DateTime<Utc>>,
    /// Newest first
    pub scan_history: VecDeque<ScanRecord>,
}

impl ShipmentProgress {
    pub fn new(config: &ShipmentConfig) -> Self {
        Self {
            logistic_id: config.logistic_id.clone(),
            expected_tag: config.expected_tag.clone(),
            dock_number: config.dock_number,
            loading_progress: config.initial_progress.min(100),
            last_scan: None,
            scan_history: VecDeque::new(),
        }
    }

    /// Account for a newly recorded valid tag. Returns true if it was this
    /// shipment's tag.
    pub fn record_valid(&mut self, tag_id: &str, at: DateTime<Utc>) -> bool {
        if tag_id != self.expected_tag {
            return false;
        }

        self.loading_progress = self.loading_progress.saturating_add(PROGRESS_STEP).min(100);
        self.last_scan = Some(at);
        self.scan_history.push_front(ScanRecord {
            at,
            status: "verified".to_string(),
            location: format!("Andén {}", self.dock_number),
        });
        self.scan_history.truncate(SCAN_HISTORY_LIMIT);

        info!(
            target: "shipment",
            logistic_id = %self.logistic_id,
            progress = self.loading_progress,
            "Shipment tag verified"
        );
        true
    }
}
