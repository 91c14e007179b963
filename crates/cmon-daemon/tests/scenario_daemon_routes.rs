//! In-process scenario tests for cmon-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` over a `MemStore`-backed state and
//! drives it via `tower::ServiceExt::oneshot`; no network or DB required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use cmon_daemon::{routes, state::AppState};
use cmon_reconcile::{BlockStatus, ChainWatermark, Layer};
use cmon_runtime::{ChainMonitor, MessageMatchRegistrar, MonitorSettings, MonitorStatus};
use cmon_testkit::{MemStore, RecordingNotifier};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt; // oneshot

const L1_START: u64 = 19_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    state: Arc<AppState>,
    store: Arc<MemStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness_with(
    monitor: watch::Receiver<MonitorStatus>,
    l1: Arc<ChainWatermark>,
    l2: Arc<ChainWatermark>,
    store: Arc<MemStore>,
) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let registrar = Arc::new(MessageMatchRegistrar::new(
        store.clone(),
        notifier.clone(),
        L1_START,
    ));
    Harness {
        state: Arc::new(AppState::new(l1, l2, registrar, monitor)),
        store,
        notifier,
    }
}

fn harness() -> Harness {
    let (_tx, rx) = watch::channel(MonitorStatus::default());
    harness_with(
        rx,
        Arc::new(ChainWatermark::new(Layer::L1)),
        Arc::new(ChainWatermark::new(Layer::L2)),
        Arc::new(MemStore::new()),
    )
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Drive a fresh router with a single request and return (status, json).
async fn call(
    state: &Arc<AppState>,
    req: Request<axum::body::Body>,
) -> (StatusCode, serde_json::Value) {
    let router = routes::build_router(Arc::clone(state));
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body: bytes::Bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = serde_json::from_slice(&body).expect("body is not valid JSON");
    (status, json)
}

fn messenger_batch(hashes: &[(&str, u64)]) -> serde_json::Value {
    let messenger: Vec<serde_json::Value> = hashes
        .iter()
        .map(|(h, n)| {
            serde_json::json!({
                "msg_hash": h,
                "block_number": n,
                "tx_hash": format!("0xtx{n}"),
            })
        })
        .collect();
    serde_json::json!({ "messenger": messenger })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let h = harness();
    let (status, json) = call(&h.state, get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "cmon-daemon");
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reflects_monitor_and_watermarks() {
    let store = Arc::new(MemStore::new());
    let l1 = Arc::new(ChainWatermark::with_numbers(Layer::L1, 10, 10));
    let l2 = Arc::new(ChainWatermark::with_numbers(Layer::L2, 300, 300));
    let mut monitor = ChainMonitor::new(
        store.clone(),
        l1.clone(),
        l2.clone(),
        Arc::new(RecordingNotifier::new()),
        MonitorSettings::default(),
    )
    .await
    .unwrap();
    let h = harness_with(monitor.subscribe(), l1, l2, store);

    monitor.tick().await;

    let (status, json) = call(&h.state, get("/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["last_confirmed"], 299);
    assert_eq!(json["ticks"], 1);
    assert_eq!(json["last_outcome"]["outcome"], "confirmed");
    assert_eq!(json["last_outcome"]["window"]["start"], 1);
    assert_eq!(json["l1"]["is_ready"], true);
    assert_eq!(json["l2"]["safe_number"], 300);
}

// ---------------------------------------------------------------------------
// POST /v1/watermarks/:layer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watermark_report_advances_and_refuses_regression() {
    let h = harness();

    let (status, json) = call(
        &h.state,
        post_json(
            "/v1/watermarks/l1",
            serde_json::json!({ "start_number": 90, "safe_number": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_ready"], false);
    assert_eq!(json["regression_refused"], false);

    let (status, json) = call(
        &h.state,
        post_json(
            "/v1/watermarks/L1",
            serde_json::json!({ "start_number": 100, "safe_number": 95 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["layer"], "l1");
    assert_eq!(json["start_number"], 100);
    assert_eq!(json["safe_number"], 100, "safe number never moves back");
    assert_eq!(json["is_ready"], true);
    assert_eq!(json["regression_refused"], true);
}

#[tokio::test]
async fn unknown_layer_is_400() {
    let h = harness();
    let (status, json) = call(
        &h.state,
        post_json(
            "/v1/watermarks/l3",
            serde_json::json!({ "start_number": 1, "safe_number": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("invalid layer"));
}

// ---------------------------------------------------------------------------
// POST /v1/message-matches/:layer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_matches_upsert_then_duplicate_is_409() {
    let h = harness();

    let (status, json) = call(
        &h.state,
        post_json(
            "/v1/message-matches/l2",
            serde_json::json!({
                "gateway": [{
                    "msg_hash": "0xg1",
                    "token_type": "standard_erc20",
                    "block_number": 500,
                    "tx_hash": "0xtx500",
                    "amounts": "50",
                }],
                "messenger": [{ "msg_hash": "0xm1", "block_number": 500, "tx_hash": "0xtx500" }],
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"], 2);

    let g = h.store.gateway_match("0xg1").unwrap();
    assert_eq!(g.l2.block_status, BlockStatus::Valid);
    assert_eq!(g.l2_amounts, "50");
    assert_eq!(g.l1.block_status, BlockStatus::Unknown);

    let (status, json) = call(
        &h.state,
        post_json("/v1/message-matches/l2", messenger_batch(&[("0xm2", 501), ("0xm1", 500)])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "messenger");
    assert_eq!(json["msg_hash"], "0xm1");
    assert_eq!(json["layer"], "l2");

    assert!(h.store.messenger_match("0xm2").is_none(), "batch rolled back");
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn store_failure_is_500() {
    let h = harness();
    h.store.fail_next_upserts(1);
    let (status, json) = call(
        &h.state,
        post_json("/v1/message-matches/l1", messenger_batch(&[("0xm1", 5)])),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("message match upsert failed"));
    assert_eq!(h.notifier.count(), 0);
}

// ---------------------------------------------------------------------------
// GET /v1/message-matches/:layer/latest-block
// ---------------------------------------------------------------------------

#[tokio::test]
async fn latest_block_falls_back_then_tracks_upserts() {
    let h = harness();

    let (status, json) = call(&h.state, get("/v1/message-matches/l1/latest-block")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["block_number"], L1_START);

    let (_, json) = call(&h.state, get("/v1/message-matches/l2/latest-block")).await;
    assert_eq!(json["block_number"], 0);

    let (status, _) = call(
        &h.state,
        post_json(
            "/v1/message-matches/l1",
            messenger_batch(&[("0xm1", L1_START + 7), ("0xm2", L1_START + 3)]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = call(&h.state, get("/v1/message-matches/l1/latest-block")).await;
    assert_eq!(json["block_number"], L1_START + 7);
}
