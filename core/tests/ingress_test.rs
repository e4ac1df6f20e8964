use chrono::{Duration, TimeZone, Utc};
use embarque_core::ingress::{
    inventory_event_name, status_event_name, INVENTORY_EVENT, LEGACY_INVALID_EVENT,
    LEGACY_VALID_EVENT, TAG_DETECTED_EVENT, TAG_EVENT,
};
use embarque_core::{
    Clock, DockState, InboundMessage, IngressRouter, LaneId, LaneTracker, ManualClock, ReaderStatus,
    Route, ShipmentConfig, Verdict,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn lanes() -> Vec<LaneId> {
    vec!["1".into(), "2".into(), "3".into()]
}

fn setup() -> (IngressRouter, DockState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 32, 10).unwrap(),
    ));
    let state = DockState::new(LaneTracker::new(lanes())).with_clock(clock.clone());
    (IngressRouter::new(&lanes()), state, clock)
}

fn msg(name: &str, payload: Value) -> InboundMessage {
    InboundMessage::new(name, payload)
}

async fn tags(state: &DockState, list: Verdict) -> Vec<String> {
    state
        .observations(list, usize::MAX)
        .await
        .into_iter()
        .map(|o| o.tag_id)
        .collect()
}

#[test]
fn route_table_covers_lane_and_generic_names() {
    let router = IngressRouter::new(&lanes());

    assert_eq!(
        router.route("lector/reader2/status"),
        Some(&Route::LaneStatus("2".into()))
    );
    assert_eq!(
        router.route("readers/reader3/inventory"),
        Some(&Route::TagEvent { forced: None })
    );
    for name in [TAG_DETECTED_EVENT, INVENTORY_EVENT, TAG_EVENT] {
        assert_eq!(router.route(name), Some(&Route::TagEvent { forced: None }));
    }
    assert_eq!(
        router.route(LEGACY_VALID_EVENT),
        Some(&Route::TagEvent {
            forced: Some(Verdict::Valid)
        })
    );
    assert_eq!(
        router.route(LEGACY_INVALID_EVENT),
        Some(&Route::TagEvent {
            forced: Some(Verdict::Invalid)
        })
    );
    assert!(router.route("lector/reader4/status").is_none());

    // 3 lanes x 2 names + 3 generic + 2 legacy
    assert_eq!(router.routes().count(), 11);
}

#[test]
fn lane_event_names() {
    let lane = LaneId::from("1");
    assert_eq!(status_event_name(&lane), "lector/reader1/status");
    assert_eq!(inventory_event_name(&lane), "readers/reader1/inventory");
}

#[tokio::test]
async fn end_to_end_scenario() {
    let (router, state, _clock) = setup();

    for lane in state.lanes().await {
        assert_eq!(lane.status, ReaderStatus::Unknown);
    }
    assert_eq!(state.size(Verdict::Valid).await, 0);
    assert_eq!(state.size(Verdict::Invalid).await, 0);

    router
        .dispatch(&state, &msg("lector/reader1/status", json!({"status": "running"})))
        .await;
    router.dispatch(&state, &msg(TAG_EVENT, json!({"epc": "E1"}))).await;
    router.dispatch(&state, &msg(TAG_EVENT, json!({"epc": "E1"}))).await;
    router
        .dispatch(&state, &msg(TAG_EVENT, json!({"epc": "E2", "valid": false})))
        .await;

    let lane1 = state.lane(&"1".into()).await.unwrap();
    assert_eq!(lane1.status, ReaderStatus::Running);
    assert!(lane1.is_reading);
    assert_eq!(tags(&state, Verdict::Valid).await, vec!["E1"]);
    assert_eq!(tags(&state, Verdict::Invalid).await, vec!["E2"]);
}

#[tokio::test]
async fn first_seen_timestamp_survives_duplicates() {
    let (router, state, clock) = setup();
    let first = clock.now();

    router.dispatch(&state, &msg(INVENTORY_EVENT, json!({"epc": "E1"}))).await;
    clock.advance(Duration::seconds(30));
    let outcome = router.dispatch(&state, &msg(INVENTORY_EVENT, json!({"epc": "E1"}))).await;

    assert_eq!(outcome.duplicates, 1);
    assert_eq!(outcome.inserted, 0);
    let obs = state.observation(Verdict::Valid, "E1").await.unwrap();
    assert_eq!(obs.first_seen_at, first);
    assert_eq!(obs.source, INVENTORY_EVENT);
}

#[tokio::test]
async fn array_payload_fans_out() {
    let (router, state, _clock) = setup();
    let outcome = router
        .dispatch(
            &state,
            &msg(
                "readers/reader2/inventory",
                json!([{"epc": "A"}, {"epc": "B", "valid": false}]),
            ),
        )
        .await;

    assert_eq!(outcome.inserted, 2);
    assert_eq!(tags(&state, Verdict::Valid).await, vec!["A"]);
    assert_eq!(tags(&state, Verdict::Invalid).await, vec!["B"]);
}

#[tokio::test]
async fn polarity_asymmetry_between_producers() {
    let (router, state, _clock) = setup();
    router
        .dispatch(&state, &msg(TAG_EVENT, json!({"type": "epc_read", "epc": "X1"})))
        .await;
    router.dispatch(&state, &msg(TAG_EVENT, json!({"epc": "X2"}))).await;
    router
        .dispatch(&state, &msg(TAG_EVENT, json!({"epc": "X3", "valid": false})))
        .await;
    router
        .dispatch(&state, &msg(TAG_EVENT, json!({"epc": "X4", "status": "invalid"})))
        .await;
    router
        .dispatch(
            &state,
            &msg(TAG_EVENT, json!({"type": "epc_read", "epc": "X5", "valid": true})),
        )
        .await;

    assert_eq!(tags(&state, Verdict::Valid).await, vec!["X5", "X2"]);
    assert_eq!(tags(&state, Verdict::Invalid).await, vec!["X4", "X3", "X1"]);
}

#[tokio::test]
async fn tag_reported_both_ways_lands_in_both_lists() {
    let (router, state, _clock) = setup();
    router.dispatch(&state, &msg(TAG_EVENT, json!({"epc": "E1"}))).await;
    router
        .dispatch(&state, &msg(TAG_EVENT, json!({"epc": "E1", "valid": false})))
        .await;

    assert!(state.contains(Verdict::Valid, "E1").await);
    assert!(state.contains(Verdict::Invalid, "E1").await);
}

#[tokio::test]
async fn legacy_names_force_their_list() {
    let (router, state, _clock) = setup();
    router
        .dispatch(&state, &msg(LEGACY_VALID_EVENT, json!({"rfid": "L1", "valid": false})))
        .await;
    router
        .dispatch(&state, &msg(LEGACY_INVALID_EVENT, json!({"epc": "L2"})))
        .await;

    assert_eq!(tags(&state, Verdict::Valid).await, vec!["L1"]);
    assert_eq!(tags(&state, Verdict::Invalid).await, vec!["L2"]);
}

#[tokio::test]
async fn unrecognized_payloads_and_names_never_block_the_stream() {
    let (router, state, _clock) = setup();

    let outcome = router.dispatch(&state, &msg(TAG_EVENT, json!({}))).await;
    assert_eq!(outcome.discarded, 1);

    let outcome = router.dispatch(&state, &msg(TAG_EVENT, Value::Null)).await;
    assert_eq!(outcome.discarded, 1);

    let outcome = router.dispatch(&state, &msg("somethingNew", json!({"epc": "Z"}))).await;
    assert!(outcome.ignored);

    let outcome = router
        .dispatch(&state, &msg("lector/reader7/status", json!({"status": "running"})))
        .await;
    assert!(outcome.ignored);

    router.dispatch(&state, &msg(TAG_EVENT, json!({"epc": "OK"}))).await;
    assert_eq!(tags(&state, Verdict::Valid).await, vec!["OK"]);
}

#[tokio::test]
async fn status_messages_bypass_the_normalizer() {
    let (router, state, _clock) = setup();
    let outcome = router
        .dispatch(
            &state,
            &msg("lector/reader3/status", json!({"status": "idle", "epc": "NOT_A_TAG"})),
        )
        .await;

    assert!(outcome.lane_updated);
    assert_eq!(outcome.inserted, 0);
    assert_eq!(state.size(Verdict::Valid).await, 0);
    assert_eq!(state.lane(&"3".into()).await.unwrap().status, ReaderStatus::Idle);
    assert_eq!(state.lane(&"1".into()).await.unwrap().status, ReaderStatus::Unknown);
}

#[tokio::test]
async fn legacy_names_use_the_shared_field_priority() {
    let (router, state, _clock) = setup();
    router
        .dispatch(&state, &msg(LEGACY_VALID_EVENT, json!({"epc": "A", "rfid": "B"})))
        .await;

    assert_eq!(tags(&state, Verdict::Valid).await, vec!["A"]);
    assert!(!state.contains(Verdict::Valid, "B").await);
}

#[tokio::test]
async fn repeated_shipment_scans_fill_progress_and_cap_history() {
    let (router, state, _clock) = setup();
    let state = state.with_shipment(&ShipmentConfig {
        logistic_id: "LOG123".into(),
        expected_tag: "RFID-9876543210".into(),
        dock_number: 2,
        initial_progress: 65,
    });

    for _ in 0..5 {
        router
            .dispatch(&state, &msg(LEGACY_VALID_EVENT, json!({"rfid": "RFID-9876543210"})))
            .await;
    }
    let progress = state.shipment().await.unwrap();
    assert_eq!(progress.loading_progress, 90);
    assert_eq!(progress.scan_history.len(), 5);

    // Invalid sightings of the same tag never count
    router
        .dispatch(&state, &msg(LEGACY_INVALID_EVENT, json!({"rfid": "RFID-9876543210"})))
        .await;
    assert_eq!(state.shipment().await.unwrap().loading_progress, 90);

    for _ in 0..7 {
        router
            .dispatch(&state, &msg(TAG_EVENT, json!({"epc": "RFID-9876543210"})))
            .await;
    }
    let progress = state.shipment().await.unwrap();
    assert_eq!(progress.loading_progress, 100);
    assert_eq!(progress.scan_history.len(), 10);
    assert_eq!(progress.scan_history[0].location, "Andén 2");
    assert_eq!(state.size(Verdict::Valid).await, 1);
}
