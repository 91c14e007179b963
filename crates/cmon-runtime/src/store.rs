//! Persistence seams used by the monitor and the registrar.
//!
//! Both traits describe whole-transaction operations: an implementation must
//! either apply everything a call asks for or nothing.

use anyhow::Result;
use async_trait::async_trait;
use cmon_reconcile::{
    BlockWindow, GatewayMessageMatch, Layer, MessengerMessageMatch, MismatchSet,
};
use sqlx::PgPool;

pub use cmon_db::UpsertOutcome;

#[async_trait]
pub trait ConfirmStore: Send + Sync {
    /// Highest confirmed L2 block, `0` when none.
    async fn latest_confirmed_number(&self) -> Result<u64>;

    /// Match every asset class over `window` and confirm all its blocks,
    /// marking the mismatching ones as failed. Atomic.
    async fn confirm_window(&self, window: BlockWindow) -> Result<MismatchSet>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Upsert one layer's view of the given rows. Atomic; stops at the first
    /// row that affects nothing and reports it as a duplicate.
    async fn upsert_message_matches(
        &self,
        layer: Layer,
        gateway: &[GatewayMessageMatch],
        messenger: &[MessengerMessageMatch],
    ) -> Result<UpsertOutcome>;

    async fn latest_valid_messenger_match(
        &self,
        layer: Layer,
    ) -> Result<Option<MessengerMessageMatch>>;
}

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConfirmStore for PgStore {
    async fn latest_confirmed_number(&self) -> Result<u64> {
        cmon_db::latest_confirmed_number(&self.pool).await
    }

    async fn confirm_window(&self, window: BlockWindow) -> Result<MismatchSet> {
        cmon_db::confirm_deposit_window(&self.pool, window).await
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn upsert_message_matches(
        &self,
        layer: Layer,
        gateway: &[GatewayMessageMatch],
        messenger: &[MessengerMessageMatch],
    ) -> Result<UpsertOutcome> {
        cmon_db::upsert_message_matches(&self.pool, layer, gateway, messenger).await
    }

    async fn latest_valid_messenger_match(
        &self,
        layer: Layer,
    ) -> Result<Option<MessengerMessageMatch>> {
        cmon_db::latest_valid_messenger_match(&self.pool, layer).await
    }
}
