//! Cross-chain deposit matcher.
//!
//! One algorithm, parameterized by an [`AssetClassDescriptor`] per asset
//! class. For every L2 finalize-deposit event in the window the mirrored L1
//! event with the same `msg_hash` is looked up and the class-relevant fields
//! are compared as exact strings. Values are never parsed as numbers:
//! `"100"` and `"100.0"` disagree.
//!
//! An L2 event with no L1 counterpart is a mismatch.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BlockWindow, EventType};

// ---------------------------------------------------------------------------
// Asset class descriptors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Native,
    Erc20,
    Erc721,
    Erc1155,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Native => "eth",
            AssetClass::Erc20 => "erc20",
            AssetClass::Erc721 => "erc721",
            AssetClass::Erc1155 => "erc1155",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareField {
    Amount,
    TokenId,
}

impl CompareField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareField::Amount => "amount",
            CompareField::TokenId => "token_id",
        }
    }
}

/// Everything the matcher needs to know about one asset class.
#[derive(Debug)]
pub struct AssetClassDescriptor {
    pub class: AssetClass,
    pub l1_table: &'static str,
    pub l2_table: &'static str,
    /// L2 event types that count as a finalized deposit of this class.
    pub finalize_types: &'static [EventType],
    /// Fields that must agree between the two sides.
    pub compare: &'static [CompareField],
}

impl AssetClassDescriptor {
    pub fn finalize_codes(&self) -> Vec<i16> {
        self.finalize_types.iter().map(|t| t.code()).collect()
    }

    pub fn accepts_code(&self, code: i16) -> bool {
        self.finalize_types.iter().any(|t| t.code() == code)
    }

    pub fn for_class(class: AssetClass) -> &'static AssetClassDescriptor {
        match class {
            AssetClass::Native => &ASSET_CLASSES[0],
            AssetClass::Erc20 => &ASSET_CLASSES[1],
            AssetClass::Erc721 => &ASSET_CLASSES[2],
            AssetClass::Erc1155 => &ASSET_CLASSES[3],
        }
    }
}

pub static ASSET_CLASSES: [AssetClassDescriptor; 4] = [
    AssetClassDescriptor {
        class: AssetClass::Native,
        l1_table: "l1_eth_events",
        l2_table: "l2_eth_events",
        finalize_types: &[EventType::FinalizeDepositEth],
        compare: &[CompareField::Amount],
    },
    AssetClassDescriptor {
        class: AssetClass::Erc20,
        l1_table: "l1_erc20_events",
        l2_table: "l2_erc20_events",
        finalize_types: &[
            EventType::FinalizeDepositDai,
            EventType::FinalizeDepositWeth,
            EventType::FinalizeDepositStandardErc20,
            EventType::FinalizeDepositCustomErc20,
            EventType::FinalizeDepositUsdc,
            EventType::FinalizeDepositLido,
            EventType::FinalizeDepositPufEth,
        ],
        compare: &[CompareField::Amount],
    },
    AssetClassDescriptor {
        class: AssetClass::Erc721,
        l1_table: "l1_erc721_events",
        l2_table: "l2_erc721_events",
        finalize_types: &[EventType::FinalizeDepositErc721],
        compare: &[CompareField::TokenId],
    },
    AssetClassDescriptor {
        class: AssetClass::Erc1155,
        l1_table: "l1_erc1155_events",
        l2_table: "l2_erc1155_events",
        finalize_types: &[EventType::FinalizeDepositErc1155],
        compare: &[CompareField::TokenId, CompareField::Amount],
    },
];

// ---------------------------------------------------------------------------
// Joined rows
// ---------------------------------------------------------------------------

/// One mirrored event row as written by the ingestion side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredEvent {
    pub msg_hash: String,
    pub number: u64,
    pub event_type: i16,
    pub amount: Option<String>,
    pub token_id: Option<String>,
}

/// One L2 finalize-deposit event joined with its L1 counterpart (if any).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositPair {
    pub msg_hash: String,
    pub l2_number: u64,
    /// `true` when the join found an L1 row with the same `msg_hash`.
    pub l1_present: bool,
    pub l1_amount: Option<String>,
    pub l2_amount: Option<String>,
    pub l1_token_id: Option<String>,
    pub l2_token_id: Option<String>,
}

impl DepositPair {
    fn values(&self, field: CompareField) -> (Option<&str>, Option<&str>) {
        match field {
            CompareField::Amount => (self.l1_amount.as_deref(), self.l2_amount.as_deref()),
            CompareField::TokenId => (self.l1_token_id.as_deref(), self.l2_token_id.as_deref()),
        }
    }
}

/// In-memory equivalent of the per-class join query: every L2 event of the
/// class inside `window`, paired with each L1 event sharing its `msg_hash`,
/// or with nothing when L1 has none.
pub fn join_mirrored(
    desc: &AssetClassDescriptor,
    window: BlockWindow,
    l1_events: &[MirroredEvent],
    l2_events: &[MirroredEvent],
) -> Vec<DepositPair> {
    let mut out = Vec::new();
    for l2 in l2_events
        .iter()
        .filter(|e| window.contains(e.number) && desc.accepts_code(e.event_type))
    {
        let mut matched = false;
        for l1 in l1_events.iter().filter(|e| e.msg_hash == l2.msg_hash) {
            matched = true;
            out.push(DepositPair {
                msg_hash: l2.msg_hash.clone(),
                l2_number: l2.number,
                l1_present: true,
                l1_amount: l1.amount.clone(),
                l2_amount: l2.amount.clone(),
                l1_token_id: l1.token_id.clone(),
                l2_token_id: l2.token_id.clone(),
            });
        }
        if !matched {
            out.push(DepositPair {
                msg_hash: l2.msg_hash.clone(),
                l2_number: l2.number,
                l1_present: false,
                l1_amount: None,
                l2_amount: l2.amount.clone(),
                l1_token_id: None,
                l2_token_id: l2.token_id.clone(),
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Mismatch evidence
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchReason {
    /// L2 finalized a deposit with no L1 origin event on record.
    MissingL1Event,
    FieldMismatch {
        field: CompareField,
        l1: Option<String>,
        l2: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositMismatch {
    pub class: AssetClass,
    pub msg_hash: String,
    pub l2_number: u64,
    pub reason: MismatchReason,
}

impl fmt::Display for DepositMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            MismatchReason::MissingL1Event => write!(
                f,
                "{} deposit finalized on L2 block {} without L1 origin (msg_hash={})",
                self.class, self.l2_number, self.msg_hash
            ),
            MismatchReason::FieldMismatch { field, l1, l2 } => write!(
                f,
                "{} deposit {} mismatch on L2 block {}: l1={} l2={} (msg_hash={})",
                self.class,
                field.as_str(),
                self.l2_number,
                l1.as_deref().unwrap_or("<null>"),
                l2.as_deref().unwrap_or("<null>"),
                self.msg_hash
            ),
        }
    }
}

/// Compare one class's joined rows. At most one mismatch per row (the first
/// disagreeing field in descriptor order).
pub fn match_class(desc: &AssetClassDescriptor, pairs: &[DepositPair]) -> Vec<DepositMismatch> {
    let mut out = Vec::new();
    for pair in pairs {
        let reason = if !pair.l1_present {
            Some(MismatchReason::MissingL1Event)
        } else {
            desc.compare.iter().find_map(|field| {
                let (l1, l2) = pair.values(*field);
                (l1 != l2).then(|| MismatchReason::FieldMismatch {
                    field: *field,
                    l1: l1.map(str::to_string),
                    l2: l2.map(str::to_string),
                })
            })
        };
        if let Some(reason) = reason {
            out.push(DepositMismatch {
                class: desc.class,
                msg_hash: pair.msg_hash.clone(),
                l2_number: pair.l2_number,
                reason,
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Union across classes
// ---------------------------------------------------------------------------

/// Failing L2 block numbers for a window, unioned across asset classes, plus
/// the per-message evidence that put them there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MismatchSet {
    numbers: BTreeSet<u64>,
    mismatches: Vec<DepositMismatch>,
}

impl MismatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `desc` over `pairs` and fold the result in.
    pub fn absorb(&mut self, desc: &AssetClassDescriptor, pairs: &[DepositPair]) {
        self.extend(match_class(desc, pairs));
    }

    pub fn extend<I: IntoIterator<Item = DepositMismatch>>(&mut self, mismatches: I) {
        for m in mismatches {
            self.numbers.insert(m.l2_number);
            self.mismatches.push(m);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn contains(&self, number: u64) -> bool {
        self.numbers.contains(&number)
    }

    /// Ascending, de-duplicated.
    pub fn failed_numbers(&self) -> Vec<u64> {
        self.numbers.iter().copied().collect()
    }

    pub fn mismatches(&self) -> &[DepositMismatch] {
        &self.mismatches
    }

    pub fn into_mismatches(self) -> Vec<DepositMismatch> {
        self.mismatches
    }
}

/// Match every asset class over in-memory event tables.
///
/// `tables` yields `(l1_events, l2_events)` for a descriptor.
pub fn match_window<'a, F>(window: BlockWindow, mut tables: F) -> MismatchSet
where
    F: FnMut(&AssetClassDescriptor) -> (&'a [MirroredEvent], &'a [MirroredEvent]),
{
    let mut set = MismatchSet::new();
    for desc in ASSET_CLASSES.iter() {
        let (l1, l2) = tables(desc);
        let pairs = join_mirrored(desc, window, l1, l2);
        set.absorb(desc, &pairs);
    }
    set
}
