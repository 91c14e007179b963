//! Request and response types for all cmon-daemon HTTP endpoints.
//!
//! Watchers report one layer at a time, so the request records carry only
//! that layer's columns; `into_match` places them on the right side of the
//! paired row.

use cmon_reconcile::{
    GatewayMessageMatch, Layer, MatchKind, MatchSide, MessengerMessageMatch, TokenType,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 409 body when a registrar batch re-asserted an already-valid layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateMatchResponse {
    pub error: String,
    pub layer: Layer,
    pub kind: MatchKind,
    pub msg_hash: String,
}

// ---------------------------------------------------------------------------
// /v1/watermarks/:layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkReport {
    pub start_number: u64,
    pub safe_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkResponse {
    pub layer: Layer,
    pub start_number: u64,
    pub safe_number: u64,
    pub is_ready: bool,
    /// One of the reported numbers was lower than the current one and ignored.
    pub regression_refused: bool,
}

// ---------------------------------------------------------------------------
// /v1/message-matches/:layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerMatchRecord {
    pub msg_hash: String,
    pub block_number: u64,
    pub tx_hash: String,
}

impl MessengerMatchRecord {
    pub fn into_match(self, layer: Layer) -> MessengerMessageMatch {
        let mut m = MessengerMessageMatch {
            msg_hash: self.msg_hash,
            l1: MatchSide::default(),
            l2: MatchSide::default(),
        };
        let side = MatchSide {
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            ..Default::default()
        };
        match layer {
            Layer::L1 => m.l1 = side,
            Layer::L2 => m.l2 = side,
        }
        m
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMatchRecord {
    pub msg_hash: String,
    pub token_type: TokenType,
    pub block_number: u64,
    pub tx_hash: String,
    /// Comma-joined amounts, empty when the token has none.
    #[serde(default)]
    pub amounts: String,
    #[serde(default)]
    pub token_ids: String,
}

impl GatewayMatchRecord {
    pub fn into_match(self, layer: Layer) -> GatewayMessageMatch {
        let side = MatchSide {
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            ..Default::default()
        };
        let mut g = GatewayMessageMatch {
            msg_hash: self.msg_hash,
            token_type: self.token_type,
            l1: MatchSide::default(),
            l2: MatchSide::default(),
            l1_amounts: String::new(),
            l2_amounts: String::new(),
            l1_token_ids: String::new(),
            l2_token_ids: String::new(),
        };
        match layer {
            Layer::L1 => {
                g.l1 = side;
                g.l1_amounts = self.amounts;
                g.l1_token_ids = self.token_ids;
            }
            Layer::L2 => {
                g.l2 = side;
                g.l2_amounts = self.amounts;
                g.l2_token_ids = self.token_ids;
            }
        }
        g
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMatchBatch {
    #[serde(default)]
    pub gateway: Vec<GatewayMatchRecord>,
    #[serde(default)]
    pub messenger: Vec<MessengerMatchRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMatchResponse {
    pub layer: Layer,
    pub rows: u64,
}

// ---------------------------------------------------------------------------
// /v1/message-matches/:layer/latest-block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestBlockResponse {
    pub layer: Layer,
    pub block_number: u64,
}
