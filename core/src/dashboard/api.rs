// Dashboard HTTP API server
//
// REST endpoints and SSE streaming for the display layer, plus the
// fire-and-forget reader control triggers.

use crate::dashboard::event_stream::EventBroadcaster;
use crate::dashboard::DashboardConfig;
use crate::lane::LaneId;
use crate::payload::Verdict;
use crate::reader_control::{dispatch_control, ControlCommand, ReaderControl};
use crate::state::DockState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const MAX_LIST_LIMIT: usize = 1000;

/// Dashboard server state
#[derive(Clone)]
struct DashboardState {
    dock: Arc<DockState>,
    broadcaster: EventBroadcaster,
    reader_control: Arc<dyn ReaderControl>,
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: DashboardConfig,
    state: DashboardState,
}

impl DashboardServer {
    pub fn new(
        config: DashboardConfig,
        dock: Arc<DockState>,
        broadcaster: EventBroadcaster,
        reader_control: Arc<dyn ReaderControl>,
    ) -> Self {
        Self {
            config,
            state: DashboardState {
                dock,
                broadcaster,
                reader_control,
            },
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/snapshot", get(snapshot_handler))
            .route("/api/lanes", get(lanes_handler))
            .route("/api/observations/:list", get(observations_handler))
            .route("/api/events/stream", get(event_stream_handler))
            .route("/api/lanes/:lane/start", post(start_reading_handler))
            .route("/api/lanes/:lane/stop", post(stop_reading_handler))
            .route("/api/polling/start", post(start_polling_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    /// Start the Dashboard server on the configured address
    pub async fn serve(self) -> crate::Result<()> {
        let addr = self.config.addr();
        info!(target: "dashboard", addr = %addr, "Starting Dashboard server");
        let listener = TcpListener::bind(&addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> crate::Result<()> {
        let app = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!(target: "dashboard", url = %format!("http://{}", addr), "Dashboard server ready");
        }
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Full state snapshot
/// Query params: ?limit=100 (default: 100, max: 1000)
async fn snapshot_handler(
    State(state): State<DashboardState>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let snapshot = state.dock.snapshot(query.limit.min(MAX_LIST_LIMIT)).await;
    Json(snapshot)
}

async fn lanes_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.dock.lanes().await)
}

/// One observation list, newest first
async fn observations_handler(
    State(state): State<DashboardState>,
    Path(list): Path<Verdict>,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let entries = state
        .dock
        .observations(list, query.limit.min(MAX_LIST_LIMIT))
        .await;
    Json(entries)
}

/// SSE endpoint for real-time state changes
async fn event_stream_handler(
    State(state): State<DashboardState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    info!(target: "dashboard", "New SSE client connected");

    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "Failed to serialize event");
                None
            }
        },
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Broadcast error");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct StartReadingBody {
    profile: Option<String>,
}

async fn start_reading_handler(
    State(state): State<DashboardState>,
    Path(lane): Path<String>,
    body: Option<Json<StartReadingBody>>,
) -> StatusCode {
    let lane = LaneId::new(lane);
    if state.dock.lane(&lane).await.is_none() {
        return StatusCode::NOT_FOUND;
    }
    let profile = body.and_then(|Json(b)| b.profile);
    dispatch_control(
        state.reader_control.clone(),
        ControlCommand::StartReading { lane, profile },
    );
    StatusCode::ACCEPTED
}

async fn stop_reading_handler(
    State(state): State<DashboardState>,
    Path(lane): Path<String>,
) -> StatusCode {
    let lane = LaneId::new(lane);
    if state.dock.lane(&lane).await.is_none() {
        return StatusCode::NOT_FOUND;
    }
    dispatch_control(state.reader_control.clone(), ControlCommand::StopReading { lane });
    StatusCode::ACCEPTED
}

async fn start_polling_handler(State(state): State<DashboardState>) -> StatusCode {
    dispatch_control(state.reader_control.clone(), ControlCommand::StartPolling);
    StatusCode::ACCEPTED
}
