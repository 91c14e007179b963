//! Postgres persistence for the chain monitor.
//!
//! - `chain_confirm`: per-L2-block confirmation state, written one window at a time.
//! - `l{1,2}_*_events`: mirrored events (read-only here, seeded by ingestion).
//! - `{gateway,messenger}_message_match`: paired message rows, upserted per layer.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod confirm;
mod events;
mod message_match;

pub use confirm::{confirm_deposit_window, fetch_chain_confirm, latest_confirmed_number};
pub use events::{insert_mirrored_event, load_deposit_pairs};
pub use message_match::{
    fetch_gateway_match, fetch_messenger_match, latest_valid_messenger_match,
    upsert_message_matches, UpsertOutcome,
};

pub const ENV_DB_URL: &str = "CMON_DATABASE_URL";

/// Connect to Postgres using CMON_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_chain_confirm_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'chain_confirm'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_chain_confirm_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Block number conversions (BIGINT <-> u64)
// ---------------------------------------------------------------------------

pub(crate) fn to_db_number(n: u64) -> Result<i64> {
    i64::try_from(n).with_context(|| format!("block number {n} exceeds BIGINT range"))
}

pub(crate) fn from_db_number(n: i64) -> Result<u64> {
    u64::try_from(n).with_context(|| format!("negative block number {n} in database"))
}
