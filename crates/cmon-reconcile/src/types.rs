use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the bridge a record or watermark belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    L1,
    L2,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::L1 => "l1",
            Layer::L2 => "l2",
        }
    }

    pub fn counterpart(&self) -> Layer {
        match self {
            Layer::L1 => Layer::L2,
            Layer::L2 => Layer::L1,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l1" | "layer1" => Ok(Layer::L1),
            "l2" | "layer2" => Ok(Layer::L2),
            other => Err(format!("invalid layer '{other}'. expected one of: l1 | l2")),
        }
    }
}

/// Per-layer validation status of a paired message-match row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    #[default]
    Unknown,
    Valid,
    Invalid,
}

impl BlockStatus {
    pub fn code(&self) -> i16 {
        match self {
            BlockStatus::Unknown => 0,
            BlockStatus::Valid => 1,
            BlockStatus::Invalid => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(BlockStatus::Unknown),
            1 => Some(BlockStatus::Valid),
            2 => Some(BlockStatus::Invalid),
            _ => None,
        }
    }
}

/// L2 finalize-deposit event variants, as stored in the `type` column of the
/// mirrored L2 event tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FinalizeDepositEth,
    FinalizeDepositDai,
    FinalizeDepositWeth,
    FinalizeDepositStandardErc20,
    FinalizeDepositCustomErc20,
    FinalizeDepositUsdc,
    FinalizeDepositLido,
    FinalizeDepositPufEth,
    FinalizeDepositErc721,
    FinalizeDepositErc1155,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::FinalizeDepositEth,
        EventType::FinalizeDepositDai,
        EventType::FinalizeDepositWeth,
        EventType::FinalizeDepositStandardErc20,
        EventType::FinalizeDepositCustomErc20,
        EventType::FinalizeDepositUsdc,
        EventType::FinalizeDepositLido,
        EventType::FinalizeDepositPufEth,
        EventType::FinalizeDepositErc721,
        EventType::FinalizeDepositErc1155,
    ];

    /// Stable storage code. Codes are part of the table contract with the
    /// ingestion side and must never be renumbered.
    pub fn code(&self) -> i16 {
        match self {
            EventType::FinalizeDepositEth => 101,
            EventType::FinalizeDepositDai => 102,
            EventType::FinalizeDepositWeth => 103,
            EventType::FinalizeDepositStandardErc20 => 104,
            EventType::FinalizeDepositCustomErc20 => 105,
            EventType::FinalizeDepositUsdc => 106,
            EventType::FinalizeDepositLido => 107,
            EventType::FinalizeDepositPufEth => 108,
            EventType::FinalizeDepositErc721 => 109,
            EventType::FinalizeDepositErc1155 => 110,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Token family carried by a gateway message match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Eth,
    Weth,
    StandardErc20,
    CustomErc20,
    Dai,
    Usdc,
    Lido,
    PufEth,
    Erc721,
    Erc1155,
}

impl TokenType {
    pub fn code(&self) -> i16 {
        match self {
            TokenType::Eth => 1,
            TokenType::Weth => 2,
            TokenType::StandardErc20 => 3,
            TokenType::CustomErc20 => 4,
            TokenType::Dai => 5,
            TokenType::Usdc => 6,
            TokenType::Lido => 7,
            TokenType::PufEth => 8,
            TokenType::Erc721 => 9,
            TokenType::Erc1155 => 10,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        [
            TokenType::Eth,
            TokenType::Weth,
            TokenType::StandardErc20,
            TokenType::CustomErc20,
            TokenType::Dai,
            TokenType::Usdc,
            TokenType::Lido,
            TokenType::PufEth,
            TokenType::Erc721,
            TokenType::Erc1155,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }
}

// ---------------------------------------------------------------------------
// Paired message-match rows
// ---------------------------------------------------------------------------

/// Which paired-match table a record lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Gateway,
    Messenger,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Gateway => "gateway",
            MatchKind::Messenger => "messenger",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a paired-match row that belong to exactly one layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSide {
    pub block_number: u64,
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default)]
    pub block_status: BlockStatus,
    #[serde(default)]
    pub status_updated_at: Option<DateTime<Utc>>,
}

impl MatchSide {
    pub fn mark_valid(&mut self, at: DateTime<Utc>) {
        self.block_status = BlockStatus::Valid;
        self.status_updated_at = Some(at);
    }

    pub fn is_valid(&self) -> bool {
        self.block_status == BlockStatus::Valid
    }
}

/// Gateway-level (token transfer) view of one bridge message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMessageMatch {
    pub msg_hash: String,
    pub token_type: TokenType,
    #[serde(default)]
    pub l1: MatchSide,
    #[serde(default)]
    pub l2: MatchSide,
    /// Comma-joined decimal amounts as emitted by the L1 gateway.
    #[serde(default)]
    pub l1_amounts: String,
    #[serde(default)]
    pub l2_amounts: String,
    /// Comma-joined decimal token ids (NFT gateways only).
    #[serde(default)]
    pub l1_token_ids: String,
    #[serde(default)]
    pub l2_token_ids: String,
}

impl GatewayMessageMatch {
    pub fn amounts(&self, layer: Layer) -> &str {
        match layer {
            Layer::L1 => &self.l1_amounts,
            Layer::L2 => &self.l2_amounts,
        }
    }

    pub fn token_ids(&self, layer: Layer) -> &str {
        match layer {
            Layer::L1 => &self.l1_token_ids,
            Layer::L2 => &self.l2_token_ids,
        }
    }
}

/// Messenger-level view of one bridge message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerMessageMatch {
    pub msg_hash: String,
    #[serde(default)]
    pub l1: MatchSide,
    #[serde(default)]
    pub l2: MatchSide,
}

/// Common surface of both paired-match row kinds.
pub trait LayeredMatch {
    const KIND: MatchKind;

    fn msg_hash(&self) -> &str;
    fn side(&self, layer: Layer) -> &MatchSide;
    fn side_mut(&mut self, layer: Layer) -> &mut MatchSide;
}

impl LayeredMatch for GatewayMessageMatch {
    const KIND: MatchKind = MatchKind::Gateway;

    fn msg_hash(&self) -> &str {
        &self.msg_hash
    }

    fn side(&self, layer: Layer) -> &MatchSide {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
        }
    }

    fn side_mut(&mut self, layer: Layer) -> &mut MatchSide {
        match layer {
            Layer::L1 => &mut self.l1,
            Layer::L2 => &mut self.l2,
        }
    }
}

impl LayeredMatch for MessengerMessageMatch {
    const KIND: MatchKind = MatchKind::Messenger;

    fn msg_hash(&self) -> &str {
        &self.msg_hash
    }

    fn side(&self, layer: Layer) -> &MatchSide {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
        }
    }

    fn side_mut(&mut self, layer: Layer) -> &mut MatchSide {
        match layer {
            Layer::L1 => &mut self.l1,
            Layer::L2 => &mut self.l2,
        }
    }
}

/// Stamp the calling layer's status as valid on every record.
pub fn stamp_layer_valid<M: LayeredMatch>(records: &mut [M], layer: Layer, at: DateTime<Utc>) {
    for r in records.iter_mut() {
        r.side_mut(layer).mark_valid(at);
    }
}

// ---------------------------------------------------------------------------
// Chain confirmation rows
// ---------------------------------------------------------------------------

/// Confirmation state of one L2 block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfirm {
    pub number: u64,
    /// All finalize-deposit events in this block matched their L1 origin.
    pub deposit_status: bool,
    /// The block has been processed by the reconciliation engine.
    pub confirm: bool,
}
