//! Message-match registrar.
//!
//! Records, per layer, that the gateway and messenger events of a bridge
//! message have been observed. Each call is one transaction:
//!
//! - every record gets the calling layer's status set to `valid` and its
//!   timestamp set to now (UTC) before writing;
//! - a record whose layer is already `valid` is a duplicate write. The batch
//!   is rolled back, one anomaly is raised after the rollback, and the call
//!   fails with [`DuplicateMatchError`];
//! - a committed batch must have touched exactly one row per record.

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cmon_reconcile::{
    stamp_layer_valid, GatewayMessageMatch, Layer, LayeredMatch, MatchKind, MessengerMessageMatch,
};

use crate::notify::{Anomaly, Notifier};
use crate::store::{MatchStore, UpsertOutcome};

/// A registrar batch was rejected because one record re-asserted a layer
/// that was already valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatchError {
    pub layer: Layer,
    pub kind: MatchKind,
    pub msg_hash: String,
}

impl fmt::Display for DuplicateMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicated {} message match on {}, msg_hash={}",
            self.kind, self.layer, self.msg_hash
        )
    }
}

impl std::error::Error for DuplicateMatchError {}

pub struct MessageMatchRegistrar {
    store: Arc<dyn MatchStore>,
    notifier: Arc<dyn Notifier>,
    l1_start_number: u64,
}

impl MessageMatchRegistrar {
    /// `l1_start_number` seeds the L1 watermark on a cold start.
    pub fn new(store: Arc<dyn MatchStore>, notifier: Arc<dyn Notifier>, l1_start_number: u64) -> Self {
        Self {
            store,
            notifier,
            l1_start_number,
        }
    }

    /// Stamp and upsert both record sets for `layer`. Returns the number of
    /// rows written.
    pub async fn upsert_for_layer(
        &self,
        layer: Layer,
        mut gateway: Vec<GatewayMessageMatch>,
        mut messenger: Vec<MessengerMessageMatch>,
    ) -> Result<u64> {
        let expected = (gateway.len() + messenger.len()) as u64;
        if expected == 0 {
            return Ok(0);
        }

        let now = Utc::now();
        stamp_layer_valid(&mut messenger, layer, now);
        stamp_layer_valid(&mut gateway, layer, now);

        let outcome = self
            .store
            .upsert_message_matches(layer, &gateway, &messenger)
            .await
            .with_context(|| format!("message match upsert failed layer={layer}"))?;

        match outcome {
            UpsertOutcome::Applied { affected } => {
                if affected != expected {
                    bail!(
                        "message match upsert touched {affected} rows, expected {expected} (layer={layer})"
                    );
                }
                tracing::debug!(layer = %layer, rows = affected, "message matches upserted");
                Ok(affected)
            }
            UpsertOutcome::Duplicate { kind, msg_hash } => {
                let anomaly = Anomaly::DuplicateMatch {
                    layer,
                    kind,
                    msg_hash: msg_hash.clone(),
                };
                self.notifier.notify(&anomaly);
                Err(DuplicateMatchError {
                    layer,
                    kind,
                    msg_hash,
                }
                .into())
            }
        }
    }

    /// Block number to resume ingestion from on `layer`.
    ///
    /// The layer's block of the most recent valid messenger match, or the
    /// configured L1 start number / `0` for L2 when there is none.
    pub async fn latest_block_number(&self, layer: Layer) -> Result<u64> {
        let latest = self
            .store
            .latest_valid_messenger_match(layer)
            .await
            .with_context(|| format!("latest valid messenger match lookup failed layer={layer}"))?;

        Ok(match latest {
            Some(m) => m.side(layer).block_number,
            None => match layer {
                Layer::L1 => self.l1_start_number,
                Layer::L2 => 0,
            },
        })
    }
}
