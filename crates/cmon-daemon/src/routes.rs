//! Axum router and all HTTP handlers for cmon-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cmon_reconcile::{Layer, WatermarkSource};
use cmon_runtime::DuplicateMatchError;
use tracing::{info, warn};

use crate::{
    api_types::{
        DuplicateMatchResponse, ErrorResponse, HealthResponse, LatestBlockResponse,
        MessageMatchBatch, MessageMatchResponse, WatermarkReport, WatermarkResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/watermarks/:layer", post(report_watermark))
        .route("/v1/message-matches/:layer", post(upsert_message_matches))
        .route(
            "/v1/message-matches/:layer/latest-block",
            get(latest_block_number),
        )
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn parse_layer(raw: &str) -> Result<Layer, Response> {
    raw.parse::<Layer>()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.snapshot()))
}

// ---------------------------------------------------------------------------
// POST /v1/watermarks/:layer
// ---------------------------------------------------------------------------

/// Chain watchers report their ingested and safe block numbers here.
/// Lower values than the current ones are ignored; the response says so.
pub(crate) async fn report_watermark(
    State(st): State<Arc<AppState>>,
    Path(layer): Path<String>,
    Json(report): Json<WatermarkReport>,
) -> Response {
    let layer = match parse_layer(&layer) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    let wm = st.watermark(layer);
    let update = wm.advance(report.start_number, report.safe_number);
    if update.has_regression() {
        warn!(
            layer = %layer,
            start = ?update.start,
            safe = ?update.safe,
            "watermark regression refused"
        );
    }

    (
        StatusCode::OK,
        Json(WatermarkResponse {
            layer,
            start_number: wm.start_number(),
            safe_number: wm.safe_number(),
            is_ready: wm.is_ready(),
            regression_refused: update.has_regression(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/message-matches/:layer
// ---------------------------------------------------------------------------

/// Registrar upsert for one layer.
///
/// `409 Conflict` when the batch re-asserted an already-valid layer; nothing
/// from the batch is written in that case.
pub(crate) async fn upsert_message_matches(
    State(st): State<Arc<AppState>>,
    Path(layer): Path<String>,
    Json(batch): Json<MessageMatchBatch>,
) -> Response {
    let layer = match parse_layer(&layer) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    let gateway = batch
        .gateway
        .into_iter()
        .map(|r| r.into_match(layer))
        .collect();
    let messenger = batch
        .messenger
        .into_iter()
        .map(|r| r.into_match(layer))
        .collect();

    match st.registrar.upsert_for_layer(layer, gateway, messenger).await {
        Ok(rows) => {
            info!(layer = %layer, rows, "message-matches upserted");
            (StatusCode::OK, Json(MessageMatchResponse { layer, rows })).into_response()
        }
        Err(err) => match err.downcast_ref::<DuplicateMatchError>() {
            Some(dup) => (
                StatusCode::CONFLICT,
                Json(DuplicateMatchResponse {
                    error: dup.to_string(),
                    layer: dup.layer,
                    kind: dup.kind,
                    msg_hash: dup.msg_hash.clone(),
                }),
            )
                .into_response(),
            None => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")),
        },
    }
}

// ---------------------------------------------------------------------------
// GET /v1/message-matches/:layer/latest-block
// ---------------------------------------------------------------------------

pub(crate) async fn latest_block_number(
    State(st): State<Arc<AppState>>,
    Path(layer): Path<String>,
) -> Response {
    let layer = match parse_layer(&layer) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    match st.registrar.latest_block_number(layer).await {
        Ok(block_number) => (
            StatusCode::OK,
            Json(LatestBlockResponse {
                layer,
                block_number,
            }),
        )
            .into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")),
    }
}
