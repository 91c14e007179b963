//! In-memory stand-ins for the chain monitor's collaborators.
//!
//! [`MemStore`] implements both store traits with the same all-or-nothing
//! semantics as the Postgres adapter, plus failure injection.
//! [`RecordingNotifier`] keeps every anomaly it is handed.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use async_trait::async_trait;
use cmon_reconcile::{
    match_window, AssetClass, BlockWindow, ChainConfirm, GatewayMessageMatch, Layer, LayeredMatch,
    MatchKind, MessengerMessageMatch, MirroredEvent, MismatchSet,
};
use cmon_runtime::{Anomaly, ConfirmStore, MatchStore, Notifier, UpsertOutcome};

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemInner {
    /// Indexed like `ASSET_CLASSES`.
    l1_events: [Vec<MirroredEvent>; 4],
    l2_events: [Vec<MirroredEvent>; 4],
    chain_confirm: BTreeMap<u64, ChainConfirm>,
    /// msg_hash -> (insertion sequence, row)
    messenger: BTreeMap<String, (u64, MessengerMessageMatch)>,
    gateway: BTreeMap<String, (u64, GatewayMessageMatch)>,
    next_seq: u64,
    fail_confirms: u32,
    fail_upserts: u32,
    confirm_calls: u64,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

fn class_index(class: AssetClass) -> usize {
    match class {
        AssetClass::Native => 0,
        AssetClass::Erc20 => 1,
        AssetClass::Erc721 => 2,
        AssetClass::Erc1155 => 3,
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a mirrored event to the `layer` table of `class`.
    pub fn push_event(&self, layer: Layer, class: AssetClass, ev: MirroredEvent) {
        let mut g = self.inner();
        let i = class_index(class);
        match layer {
            Layer::L1 => g.l1_events[i].push(ev),
            Layer::L2 => g.l2_events[i].push(ev),
        }
    }

    /// Pre-populate a `chain_confirm` row, as ingestion does lazily.
    pub fn put_chain_confirm(&self, row: ChainConfirm) {
        self.inner().chain_confirm.insert(row.number, row);
    }

    /// Make the next `n` window commits fail after matching has run.
    pub fn fail_next_confirms(&self, n: u32) {
        self.inner().fail_confirms = n;
    }

    /// Make the next `n` registrar transactions fail after staging their rows.
    pub fn fail_next_upserts(&self, n: u32) {
        self.inner().fail_upserts = n;
    }

    pub fn chain_confirm(&self, number: u64) -> Option<ChainConfirm> {
        self.inner().chain_confirm.get(&number).copied()
    }

    pub fn chain_confirm_rows(&self) -> Vec<ChainConfirm> {
        self.inner().chain_confirm.values().copied().collect()
    }

    pub fn confirm_calls(&self) -> u64 {
        self.inner().confirm_calls
    }

    pub fn messenger_match(&self, msg_hash: &str) -> Option<MessengerMessageMatch> {
        self.inner().messenger.get(msg_hash).map(|(_, m)| m.clone())
    }

    pub fn gateway_match(&self, msg_hash: &str) -> Option<GatewayMessageMatch> {
        self.inner().gateway.get(msg_hash).map(|(_, m)| m.clone())
    }

    pub fn message_match_count(&self) -> usize {
        let g = self.inner();
        g.messenger.len() + g.gateway.len()
    }
}

#[async_trait]
impl ConfirmStore for MemStore {
    async fn latest_confirmed_number(&self) -> Result<u64> {
        Ok(self
            .inner()
            .chain_confirm
            .values()
            .filter(|r| r.confirm)
            .map(|r| r.number)
            .max()
            .unwrap_or(0))
    }

    async fn confirm_window(&self, window: BlockWindow) -> Result<MismatchSet> {
        let mut g = self.inner();
        g.confirm_calls += 1;

        let set = {
            let inner = &*g;
            match_window(window, |d| {
                let i = class_index(d.class);
                (&inner.l1_events[i][..], &inner.l2_events[i][..])
            })
        };

        if g.fail_confirms > 0 {
            g.fail_confirms -= 1;
            bail!("injected commit failure for window {window}");
        }

        for number in window.numbers() {
            g.chain_confirm.insert(
                number,
                ChainConfirm {
                    number,
                    deposit_status: !set.contains(number),
                    confirm: true,
                },
            );
        }
        Ok(set)
    }
}

/// Apply one layer's side of `incoming` onto `existing` (or a fresh row).
/// `None` when that layer is already valid: the guarded update touches no row.
fn merge_layer<M: LayeredMatch + Clone>(
    existing: Option<&M>,
    incoming: &M,
    layer: Layer,
    fresh: impl FnOnce() -> M,
) -> Option<M> {
    match existing {
        None => {
            let mut row = fresh();
            *row.side_mut(layer) = incoming.side(layer).clone();
            Some(row)
        }
        Some(row) if row.side(layer).is_valid() => None,
        Some(row) => {
            let mut row = row.clone();
            *row.side_mut(layer) = incoming.side(layer).clone();
            Some(row)
        }
    }
}

#[async_trait]
impl MatchStore for MemStore {
    async fn upsert_message_matches(
        &self,
        layer: Layer,
        gateway: &[GatewayMessageMatch],
        messenger: &[MessengerMessageMatch],
    ) -> Result<UpsertOutcome> {
        let mut g = self.inner();

        // Stage on copies; publish only on success.
        let mut staged_messenger = g.messenger.clone();
        let mut staged_gateway = g.gateway.clone();
        let mut seq = g.next_seq;
        let mut affected = 0u64;

        for m in messenger {
            let existing = staged_messenger.get(&m.msg_hash);
            let id = existing.map(|(id, _)| *id);
            let merged = merge_layer(existing.map(|(_, r)| r), m, layer, || MessengerMessageMatch {
                msg_hash: m.msg_hash.clone(),
                l1: Default::default(),
                l2: Default::default(),
            });
            let Some(row) = merged else {
                return Ok(UpsertOutcome::Duplicate {
                    kind: MatchKind::Messenger,
                    msg_hash: m.msg_hash.clone(),
                });
            };
            let id = id.unwrap_or_else(|| {
                seq += 1;
                seq
            });
            staged_messenger.insert(m.msg_hash.clone(), (id, row));
            affected += 1;
        }

        for gw in gateway {
            let existing = staged_gateway.get(&gw.msg_hash);
            let id = existing.map(|(id, _)| *id);
            let merged = merge_layer(existing.map(|(_, r)| r), gw, layer, || GatewayMessageMatch {
                msg_hash: gw.msg_hash.clone(),
                token_type: gw.token_type,
                l1: Default::default(),
                l2: Default::default(),
                l1_amounts: String::new(),
                l2_amounts: String::new(),
                l1_token_ids: String::new(),
                l2_token_ids: String::new(),
            });
            let Some(mut row) = merged else {
                return Ok(UpsertOutcome::Duplicate {
                    kind: MatchKind::Gateway,
                    msg_hash: gw.msg_hash.clone(),
                });
            };
            match layer {
                Layer::L1 => {
                    row.l1_amounts = gw.l1_amounts.clone();
                    row.l1_token_ids = gw.l1_token_ids.clone();
                }
                Layer::L2 => {
                    row.l2_amounts = gw.l2_amounts.clone();
                    row.l2_token_ids = gw.l2_token_ids.clone();
                }
            }
            let id = id.unwrap_or_else(|| {
                seq += 1;
                seq
            });
            staged_gateway.insert(gw.msg_hash.clone(), (id, row));
            affected += 1;
        }

        if g.fail_upserts > 0 {
            g.fail_upserts -= 1;
            bail!("injected message match commit failure");
        }

        g.messenger = staged_messenger;
        g.gateway = staged_gateway;
        g.next_seq = seq;
        Ok(UpsertOutcome::Applied { affected })
    }

    async fn latest_valid_messenger_match(
        &self,
        layer: Layer,
    ) -> Result<Option<MessengerMessageMatch>> {
        Ok(self
            .inner()
            .messenger
            .values()
            .filter(|(_, m)| m.side(layer).is_valid())
            .max_by_key(|(id, m)| (m.side(layer).block_number, *id))
            .map(|(_, m)| m.clone()))
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Anomaly>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, anomaly: &Anomaly) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(anomaly.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmon_reconcile::ASSET_CLASSES;

    #[test]
    fn class_index_follows_descriptor_order() {
        for (i, desc) in ASSET_CLASSES.iter().enumerate() {
            assert_eq!(class_index(desc.class), i);
        }
    }
}
