use axum::{extract::State, routing::post, Json, Router};
use embarque_core::reader_control::{START_POLLING_PATH, START_READING_PATH, STOP_READING_PATH};
use embarque_core::{HttpReaderControl, LaneId, ReaderControl, ReaderControlConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

type Captured = Arc<Mutex<Vec<(String, Value)>>>;

/// Minimal reader backend that records every request body
async fn spawn_backend() -> (String, Captured) {
    let captured: Captured = Arc::default();

    async fn record(
        State((path, captured)): State<(&'static str, Captured)>,
        body: Option<Json<Value>>,
    ) -> Json<Value> {
        let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
        captured.lock().await.push((path.to_string(), body));
        Json(json!({"success": true}))
    }

    let app = Router::new()
        .route(
            START_READING_PATH,
            post(record).with_state((START_READING_PATH, captured.clone())),
        )
        .route(
            STOP_READING_PATH,
            post(record).with_state((STOP_READING_PATH, captured.clone())),
        )
        .route(
            START_POLLING_PATH,
            post(record).with_state((START_POLLING_PATH, captured.clone())),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), captured)
}

fn control(base_url: String) -> HttpReaderControl {
    HttpReaderControl::new(ReaderControlConfig {
        base_url,
        default_profile: "TEST".into(),
        timeout_ms: 2_000,
    })
    .unwrap()
}

#[tokio::test]
async fn start_reading_names_the_reader_and_profile() {
    let (url, captured) = spawn_backend().await;
    let control = control(url);

    let response = control
        .start_reading(&LaneId::from("2"), Some("DOCK"))
        .await
        .unwrap();
    assert_eq!(response["success"], true);

    control.start_reading(&LaneId::from("1"), None).await.unwrap();

    let calls = captured.lock().await.clone();
    assert_eq!(calls[0].0, START_READING_PATH);
    assert_eq!(calls[0].1, json!({"lectorId": "reader2", "perfil": "DOCK"}));
    assert_eq!(calls[1].1, json!({"lectorId": "reader1", "perfil": "TEST"}));
}

#[tokio::test]
async fn stop_reading_and_polling_hit_their_endpoints() {
    let (url, captured) = spawn_backend().await;
    // Trailing slash in the base URL is tolerated
    let control = control(format!("{}/", url));

    control.stop_reading(&LaneId::from("3")).await.unwrap();
    control.start_polling().await.unwrap();

    let calls = captured.lock().await.clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], (STOP_READING_PATH.to_string(), json!({"lectorId": "reader3"})));
    assert_eq!(calls[1].0, START_POLLING_PATH);
}

#[tokio::test]
async fn unreachable_backend_is_an_error_not_a_panic() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let control = control(format!("http://{}", addr));
    let err = control.start_polling().await.unwrap_err();
    assert!(err.to_string().starts_with("Reader control error"));
}

#[tokio::test]
async fn dispatched_failure_is_only_logged() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let control: Arc<dyn ReaderControl> = Arc::new(control(format!("http://{}", addr)));
    let handle = embarque_core::reader_control::dispatch_control(
        control,
        embarque_core::ControlCommand::StopReading { lane: "1".into() },
    );
    assert!(handle.await.is_ok());
}

#[test]
fn default_profile_is_test() {
    std::env::remove_var("EMBARQUE_READER_PROFILE");
    assert_eq!(ReaderControlConfig::default().default_profile, "TEST");
}
