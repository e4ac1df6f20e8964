use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::net::TcpStream;
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{debug, info, warn};

use embarque_core::{DockState, EmbarqueError, InboundMessage, IngressSender, TransportConfig};

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("invalid frame: {0}")]
    Frame(String),
    #[error("ingress error: {0}")]
    Ingress(#[from] EmbarqueError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// One line of the upstream stream: `{"event": "...", "data": ...}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransportFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl From<TransportFrame> for InboundMessage {
    fn from(frame: TransportFrame) -> Self {
        InboundMessage::new(frame.event, frame.data)
    }
}

pub fn parse_frame(line: &str) -> Result<InboundMessage> {
    let frame: TransportFrame =
        serde_json::from_str(line).map_err(|e| BridgeError::Frame(e.to_string()))?;
    if frame.event.is_empty() {
        return Err(BridgeError::Frame("empty event name".into()));
    }
    Ok(frame.into())
}

/// Forward every valid frame from `reader` until EOF.
///
/// Malformed lines are logged and skipped. Returns the number of frames
/// forwarded; fails only on read errors or a closed ingress queue.
pub async fn pump_lines<R>(reader: R, ingress: &IngressSender) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    use tokio::io::AsyncBufReadExt;

    let mut lines = LinesStream::new(reader.lines());
    let mut forwarded = 0;

    while let Some(line) = lines.next().await {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_frame(line) {
            Ok(message) => {
                debug!(target: "bridge", event = %message.name, "Frame received");
                ingress.send(message).await?;
                forwarded += 1;
            }
            Err(e) => {
                warn!(target: "bridge", error = %e, "Skipping malformed frame");
            }
        }
    }
    Ok(forwarded)
}

/// Persistent connection to the upstream event stream
pub struct UpstreamLink {
    config: TransportConfig,
    ingress: IngressSender,
    state: Arc<DockState>,
}

impl UpstreamLink {
    pub fn new(config: TransportConfig, ingress: IngressSender, state: Arc<DockState>) -> Self {
        Self {
            config,
            ingress,
            state,
        }
    }

    /// Connect once and pump frames until the upstream closes.
    ///
    /// The link signal is raised while connected and dropped afterwards.
    pub async fn connect_once(&self) -> Result<usize> {
        let stream = TcpStream::connect(&self.config.upstream_addr).await?;
        let connected_at = Utc::now();
        info!(target: "bridge", addr = %self.config.upstream_addr, "Upstream connected");
        self.state.set_link(true).await;

        let result = pump_lines(BufReader::new(stream), &self.ingress).await;

        self.state.set_link(false).await;
        let uptime_ms = (Utc::now() - connected_at).num_milliseconds();
        match &result {
            Ok(frames) => {
                info!(target: "bridge", frames, uptime_ms, "Upstream closed")
            }
            Err(e) => {
                warn!(target: "bridge", error = %e, uptime_ms, "Upstream link failed")
            }
        }
        result
    }

    /// Reconnect forever. Returns only when the ingress queue is gone.
    pub async fn run(self) -> Result<()> {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            match self.connect_once().await {
                Ok(_) => {}
                Err(BridgeError::Ingress(e)) => return Err(e.into()),
                Err(BridgeError::Io(e)) => {
                    warn!(target: "bridge", addr = %self.config.upstream_addr, error = %e, "Upstream unavailable")
                }
                Err(e) => warn!(target: "bridge", error = %e, "Upstream error"),
            }
            debug!(target: "bridge", delay_ms = self.config.reconnect_delay_ms, "Reconnecting");
            tokio::time::sleep(delay).await;
        }
    }
}

pub async fn start_link(
    config: TransportConfig,
    ingress: IngressSender,
    state: Arc<DockState>,
) -> Result<()> {
    info!(target: "bridge", addr = %config.upstream_addr, "Starting Embarque upstream link");
    UpstreamLink::new(config, ingress, state).run().await
}
