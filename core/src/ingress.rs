// Ingress adapter
//
// Explicit message-name -> route table, built once at startup. Tag events go
// through the normalizer into the observation store; lane status messages go
// straight to the lane tracker. Unknown names are ignored.

use crate::lane::LaneId;
use crate::payload::{Normalizer, Verdict};
use crate::state::DockState;
use crate::{EmbarqueError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Legacy "valid tag detected" event
pub const LEGACY_VALID_EVENT: &str = "epcDetectado";
/// Legacy "unidentified tag" event
pub const LEGACY_INVALID_EVENT: &str = "epcNoIdentificado";
pub const TAG_DETECTED_EVENT: &str = "rfidTagDetected";
pub const INVENTORY_EVENT: &str = "inventory";
pub const TAG_EVENT: &str = "tag";

/// "lector/reader{N}/status"
pub fn status_event_name(lane: &LaneId) -> String {
    format!("lector/{}/status", lane.reader_name())
}

/// "readers/reader{N}/inventory"
pub fn inventory_event_name(lane: &LaneId) -> String {
    format!("readers/{}/inventory", lane.reader_name())
}

/// A named message as delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

impl InboundMessage {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Where a message name is dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Status update for one lane
    LaneStatus(LaneId),
    /// Tag event. `forced` fixes the list regardless of payload (legacy names).
    TagEvent { forced: Option<Verdict> },
}

/// What a single dispatch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub discarded: usize,
    pub lane_updated: bool,
    /// Name not in the route table
    pub ignored: bool,
}

pub struct IngressRouter {
    routes: BTreeMap<String, Route>,
    normalizer: Normalizer,
}

impl IngressRouter {
    /// Route table for the given lanes plus the generic and legacy tag events
    pub fn new(lanes: &[LaneId]) -> Self {
        let mut routes = BTreeMap::new();
        for lane in lanes {
            routes.insert(status_event_name(lane), Route::LaneStatus(lane.clone()));
            routes.insert(inventory_event_name(lane), Route::TagEvent { forced: None });
        }
        for name in [TAG_DETECTED_EVENT, INVENTORY_EVENT, TAG_EVENT] {
            routes.insert(name.to_string(), Route::TagEvent { forced: None });
        }
        routes.insert(
            LEGACY_VALID_EVENT.to_string(),
            Route::TagEvent {
                forced: Some(Verdict::Valid),
            },
        );
        routes.insert(
            LEGACY_INVALID_EVENT.to_string(),
            Route::TagEvent {
                forced: Some(Verdict::Invalid),
            },
        );

        info!(target: "ingress", routes = routes.len(), "Ingress route table built");
        Self {
            routes,
            normalizer: Normalizer::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    /// Supported message set, sorted by name
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Route)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route))
    }

    /// Dispatch one message against the dock state. Never fails; a bad
    /// payload only shows up in the outcome and the logs.
    pub async fn dispatch(&self, state: &DockState, message: &InboundMessage) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let Some(route) = self.routes.get(&message.name) else {
            debug!(target: "ingress", name = %message.name, "Unrecognized message ignored");
            outcome.ignored = true;
            return outcome;
        };

        match route {
            Route::LaneStatus(lane) => {
                outcome.lane_updated = state
                    .apply_status(lane, &message.payload, &message.name)
                    .await
                    .is_some();
            }
            Route::TagEvent { forced } => {
                for result in self.normalizer.normalize(&message.payload) {
                    match result {
                        Ok(decision) => {
                            let decision = match forced {
                                Some(verdict) => decision.with_verdict(*verdict),
                                None => decision,
                            };
                            if state.record_tag(decision, &message.name).await {
                                outcome.inserted += 1;
                            } else {
                                outcome.duplicates += 1;
                            }
                        }
                        Err(reason) => {
                            warn!(target: "ingress", name = %message.name, %reason, "Tag payload discarded");
                            outcome.discarded += 1;
                        }
                    }
                }
            }
        }
        outcome
    }
}

/// Cloneable handle for feeding the ingress queue
#[derive(Clone)]
pub struct IngressSender {
    tx: mpsc::Sender<InboundMessage>,
}

impl IngressSender {
    pub fn new(tx: mpsc::Sender<InboundMessage>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, message: InboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| EmbarqueError::IngressClosed)
    }

    pub async fn emit(&self, name: impl Into<String>, payload: Value) -> Result<()> {
        self.send(InboundMessage::new(name, payload)).await
    }
}

/// Single consumer: drain the queue in arrival order until every sender is gone.
/// Returns the number of messages processed.
pub async fn run_ingress(
    router: Arc<IngressRouter>,
    state: Arc<DockState>,
    mut rx: mpsc::Receiver<InboundMessage>,
) -> u64 {
    info!(target: "ingress", "Ingress consumer started");
    let mut processed = 0u64;
    while let Some(message) = rx.recv().await {
        let outcome = router.dispatch(&state, &message).await;
        debug!(target: "ingress", name = %message.name, ?outcome, "Message processed");
        processed += 1;
    }
    info!(target: "ingress", processed, "Ingress consumer stopped");
    processed
}
