// Embarque Core Library
// RFID truck-loading event core: tag normalization, observation log, lane status

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod ingress;
pub mod lane;
pub mod observation;
pub mod payload;
pub mod reader_control;
pub mod shipment;
pub mod state;
pub mod telemetry;

// Export core types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EmbarqueConfig, TransportConfig};
pub use ingress::{DispatchOutcome, InboundMessage, IngressRouter, IngressSender, Route};
pub use lane::{LaneId, LaneState, LaneTracker, ReaderStatus};
pub use observation::{ObservationList, ObservationStore, TagObservation};
pub use payload::{Discard, Normalizer, TagDecision, TagField, Verdict};
pub use reader_control::{ControlCommand, HttpReaderControl, ReaderControl, ReaderControlConfig};
pub use shipment::{ShipmentConfig, ShipmentProgress};
pub use state::{DockSnapshot, DockState};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbarqueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reader control error: {0}")]
    ReaderControl(String),

    #[error("Ingress queue closed")]
    IngressClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, EmbarqueError>;

use dashboard::{DashboardServer, EventBroadcaster};
use std::sync::Arc;
use tokio::sync::mpsc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `shutdown` waits for queued messages before aborting the consumer
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Composition root: owns the dock state and the ingress queue
pub struct Embarque {
    pub config: EmbarqueConfig,
    pub state: Arc<DockState>,
    pub router: Arc<IngressRouter>,
    pub broadcaster: EventBroadcaster,
    pub reader_control: Arc<dyn ReaderControl>,
    sender: Option<IngressSender>,
    receiver: Option<mpsc::Receiver<InboundMessage>>,
    consumer: Option<JoinHandle<u64>>,
}

impl Embarque {
    pub fn new(config: EmbarqueConfig) -> Result<Self> {
        let reader_control = Arc::new(HttpReaderControl::new(config.reader_control.clone())?);
        Ok(Self::with_parts(config, Arc::new(SystemClock), reader_control))
    }

    /// Build with an explicit clock and reader control implementation
    pub fn with_parts(
        config: EmbarqueConfig,
        clock: Arc<dyn Clock>,
        reader_control: Arc<dyn ReaderControl>,
    ) -> Self {
        let broadcaster = EventBroadcaster::default();

        let mut state = DockState::new(LaneTracker::new(config.lanes.iter().cloned()))
            .with_clock(clock)
            .with_broadcaster(broadcaster.clone());
        if let Some(shipment) = &config.shipment {
            state = state.with_shipment(shipment);
        }

        let router = IngressRouter::new(&config.lanes);
        let (tx, rx) = mpsc::channel(config.transport.queue_capacity.max(1));

        Self {
            config,
            state: Arc::new(state),
            router: Arc::new(router),
            broadcaster,
            reader_control,
            sender: Some(IngressSender::new(tx)),
            receiver: Some(rx),
            consumer: None,
        }
    }

    /// Handle for feeding inbound messages. After `shutdown` the handle is
    /// closed and every send fails with `IngressClosed`.
    pub fn ingress(&self) -> IngressSender {
        match &self.sender {
            Some(sender) => sender.clone(),
            None => IngressSender::new(mpsc::channel(1).0),
        }
    }

    /// Spawn the ingress consumer
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Embarque...");

        let Some(rx) = self.receiver.take() else {
            warn!("Embarque already started");
            return Ok(());
        };
        self.consumer = Some(tokio::spawn(ingress::run_ingress(
            self.router.clone(),
            self.state.clone(),
            rx,
        )));

        info!(lanes = self.config.lanes.len(), "Embarque started successfully");
        Ok(())
    }

    /// Dashboard server bound to this instance's state
    pub fn dashboard(&self) -> DashboardServer {
        DashboardServer::new(
            self.config.dashboard.clone(),
            self.state.clone(),
            self.broadcaster.clone(),
            self.reader_control.clone(),
        )
    }

    /// Fire-and-forget reader control request
    pub fn control(&self, command: ControlCommand) -> JoinHandle<()> {
        reader_control::dispatch_control(self.reader_control.clone(), command)
    }

    /// Close the queue and let the consumer drain what is already in it.
    /// Senders still held elsewhere keep the queue open; the consumer is
    /// aborted once `SHUTDOWN_DRAIN_TIMEOUT` passes.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down Embarque...");

        self.sender.take();
        self.receiver.take();
        if let Some(mut handle) = self.consumer.take() {
            match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, &mut handle).await {
                Ok(Ok(processed)) => info!(target: "ingress", processed, "Ingress drained"),
                Ok(Err(e)) => warn!(target: "ingress", error = %e, "Ingress consumer failed"),
                Err(_) => {
                    warn!(target: "ingress", "Ingress senders still alive; aborting consumer");
                    handle.abort();
                }
            }
        }

        info!("Embarque shut down successfully");
        Ok(())
    }
}
