// Dock state: the injectable store owned by the composition root
//
// Observation lists, lane statuses, shipment progress and the link signal
// live behind one lock so each insert or update is atomic per call.

use crate::clock::{Clock, SystemClock};
use crate::dashboard::{DashboardEvent, DashboardEventType, EventBroadcaster};
use crate::lane::{LaneId, LaneState, LaneTracker};
use crate::observation::{ObservationStore, TagObservation};
use crate::payload::{TagDecision, Verdict};
use crate::shipment::{ShipmentConfig, ShipmentProgress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Signal bars shown while the upstream link is up
pub const LINK_SIGNAL_CONNECTED: u8 = 4;

struct DockInner {
    observations: ObservationStore,
    lanes: LaneTracker,
    shipment: Option<ShipmentProgress>,
    link_signal: u8,
}

/// One observation list as exposed to the display layer
#[derive(Debug, Clone, Serialize)]
pub struct ListSnapshot {
    pub count: usize,
    pub entries: Vec<TagObservation>,
}

/// Full state snapshot
#[derive(Debug, Clone, Serialize)]
pub struct DockSnapshot {
    pub timestamp: DateTime<Utc>,
    pub lanes: Vec<LaneState>,
    pub valid: ListSnapshot,
    pub invalid: ListSnapshot,
    pub shipment: Option<ShipmentProgress>,
    pub link_signal: u8,
}

pub struct DockState {
    inner: RwLock<DockInner>,
    clock: Arc<dyn Clock>,
    broadcaster: Option<EventBroadcaster>,
}

impl DockState {
    pub fn new(lanes: LaneTracker) -> Self {
        Self {
            inner: RwLock::new(DockInner {
                observations: ObservationStore::new(),
                lanes,
                shipment: None,
                link_signal: 0,
            }),
            clock: Arc::new(SystemClock),
            broadcaster: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_shipment(mut self, config: &ShipmentConfig) -> Self {
        self.inner.get_mut().shipment = Some(ShipmentProgress::new(config));
        self
    }

    /// Dashboard broadcaster notified on every accepted change
    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record a classified tag in its list. Returns true if newly inserted.
    /// A valid sighting of the shipment tag advances progress even when the
    /// list already holds it.
    pub async fn record_tag(&self, decision: TagDecision, source: &str) -> bool {
        let now = self.clock.now();
        let TagDecision {
            tag_id,
            verdict,
            raw_payload,
            ..
        } = decision;

        let (inserted, shipment_advanced) = {
            let mut inner = self.inner.write().await;
            let inserted = inner
                .observations
                .insert(verdict, &tag_id, now, source, raw_payload);
            // Every valid scan of the shipment tag counts, repeats included
            let advanced = verdict.is_valid()
                && inner
                    .shipment
                    .as_mut()
                    .map(|s| s.record_valid(&tag_id, now))
                    .unwrap_or(false);
            (inserted, advanced)
        };

        if inserted {
            let event_type = match verdict {
                Verdict::Valid => DashboardEventType::ValidTag,
                Verdict::Invalid => DashboardEventType::InvalidTag,
            };
            self.notify(now, event_type, Some(source), None, Some(tag_id.as_str()), verdict.as_str());
        }
        if shipment_advanced {
            self.notify(
                now,
                DashboardEventType::ShipmentProgress,
                Some(source),
                None,
                Some(tag_id.as_str()),
                "shipment tag verified",
            );
        }
        inserted
    }

    /// Apply a lane status message. `None` for unconfigured lanes.
    pub async fn apply_status(&self, lane: &LaneId, payload: &Value, source: &str) -> Option<LaneState> {
        let now = self.clock.now();
        let updated = {
            let mut inner = self.inner.write().await;
            inner.lanes.apply_status(lane, payload, now).cloned()
        };

        if let Some(state) = &updated {
            self.notify(
                now,
                DashboardEventType::LaneStatus,
                Some(source),
                Some(lane.as_str()),
                None,
                state.status.as_str(),
            );
        }
        updated
    }

    /// Flip the coarse link indicator on transport connect/disconnect
    pub async fn set_link(&self, connected: bool) {
        let signal = if connected { LINK_SIGNAL_CONNECTED } else { 0 };
        let changed = {
            let mut inner = self.inner.write().await;
            let changed = inner.link_signal != signal;
            inner.link_signal = signal;
            changed
        };
        if changed {
            info!(target: "dock_state", connected, signal, "Link signal changed");
            let detail = if connected { "connected" } else { "disconnected" };
            self.notify(self.clock.now(), DashboardEventType::LinkSignal, None, None, None, detail);
        }
    }

    pub async fn size(&self, list: Verdict) -> usize {
        self.inner.read().await.observations.size(list)
    }

    pub async fn contains(&self, list: Verdict, tag_id: &str) -> bool {
        self.inner.read().await.observations.list(list).contains(tag_id)
    }

    pub async fn observation(&self, list: Verdict, tag_id: &str) -> Option<TagObservation> {
        self.inner
            .read()
            .await
            .observations
            .list(list)
            .get(tag_id)
            .cloned()
    }

    /// Newest first, up to `limit`
    pub async fn observations(&self, list: Verdict, limit: usize) -> Vec<TagObservation> {
        self.inner.read().await.observations.list(list).recent(limit)
    }

    pub async fn lane(&self, lane: &LaneId) -> Option<LaneState> {
        self.inner.read().await.lanes.lane(lane).cloned()
    }

    pub async fn lanes(&self) -> Vec<LaneState> {
        self.inner.read().await.lanes.lanes().to_vec()
    }

    pub async fn shipment(&self) -> Option<ShipmentProgress> {
        self.inner.read().await.shipment.clone()
    }

    pub async fn link_signal(&self) -> u8 {
        self.inner.read().await.link_signal
    }

    /// Snapshot with at most `limit` entries per list
    pub async fn snapshot(&self, limit: usize) -> DockSnapshot {
        let inner = self.inner.read().await;
        let list = |verdict: Verdict| {
            let l = inner.observations.list(verdict);
            ListSnapshot {
                count: l.len(),
                entries: l.recent(limit),
            }
        };
        DockSnapshot {
            timestamp: self.clock.now(),
            lanes: inner.lanes.lanes().to_vec(),
            valid: list(Verdict::Valid),
            invalid: list(Verdict::Invalid),
            shipment: inner.shipment.clone(),
            link_signal: inner.link_signal,
        }
    }

    fn notify(
        &self,
        at: DateTime<Utc>,
        event_type: DashboardEventType,
        source: Option<&str>,
        lane: Option<&str>,
        tag_id: Option<&str>,
        detail: &str,
    ) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(DashboardEvent {
                timestamp: at.to_rfc3339(),
                event_type,
                source: source.map(str::to_string),
                lane: lane.map(str::to_string),
                tag_id: tag_id.map(str::to_string),
                detail: detail.to_string(),
            });
        }
    }
}

impl Default for DockState {
    fn default() -> Self {
        Self::new(LaneTracker::default())
    }
}
