use anyhow::{anyhow, Context, Result};
use cmon_reconcile::{
    BlockStatus, GatewayMessageMatch, Layer, LayeredMatch, MatchKind, MatchSide,
    MessengerMessageMatch, TokenType,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use crate::{from_db_number, to_db_number};

/// Result of one per-layer upsert batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Every row was written and the transaction committed.
    Applied { affected: u64 },
    /// A row affected zero rows: its layer was already `valid`. The whole
    /// batch was rolled back.
    Duplicate { kind: MatchKind, msg_hash: String },
}

/// Upsert paired-match rows for `layer` in one transaction.
///
/// Inserts a row for a new `msg_hash`; otherwise updates only the columns of
/// `layer`, and only while that layer's status is not yet `valid`. Any second
/// write of an already-valid layer therefore affects zero rows, whether or not
/// its block number, tx hash or amounts match the stored ones. That rolls the
/// batch back and is returned as [`UpsertOutcome::Duplicate`]; the first
/// valid write is never overwritten.
///
/// Messenger rows are written before gateway rows.
pub async fn upsert_message_matches(
    pool: &PgPool,
    layer: Layer,
    gateway: &[GatewayMessageMatch],
    messenger: &[MessengerMessageMatch],
) -> Result<UpsertOutcome> {
    let mut tx = pool.begin().await.context("upsert_message_matches begin failed")?;
    let mut affected: u64 = 0;

    for m in messenger {
        let n = upsert_messenger(&mut tx, layer, m).await?;
        if n == 0 {
            tx.rollback().await.context("upsert_message_matches rollback failed")?;
            return Ok(UpsertOutcome::Duplicate {
                kind: MatchKind::Messenger,
                msg_hash: m.msg_hash.clone(),
            });
        }
        affected += n;
    }

    for g in gateway {
        let n = upsert_gateway(&mut tx, layer, g).await?;
        if n == 0 {
            tx.rollback().await.context("upsert_message_matches rollback failed")?;
            return Ok(UpsertOutcome::Duplicate {
                kind: MatchKind::Gateway,
                msg_hash: g.msg_hash.clone(),
            });
        }
        affected += n;
    }

    tx.commit().await.context("upsert_message_matches commit failed")?;
    Ok(UpsertOutcome::Applied { affected })
}

async fn upsert_messenger(
    conn: &mut PgConnection,
    layer: Layer,
    m: &MessengerMessageMatch,
) -> Result<u64> {
    let p = layer.as_str();
    let sql = format!(
        r#"
        insert into messenger_message_match
          (msg_hash, {p}_block_number, {p}_tx_hash, {p}_block_status, {p}_block_status_updated_at)
        values ($1, $2, $3, $4, $5)
        on conflict (msg_hash) do update set
          {p}_block_number = excluded.{p}_block_number,
          {p}_tx_hash = excluded.{p}_tx_hash,
          {p}_block_status = excluded.{p}_block_status,
          {p}_block_status_updated_at = excluded.{p}_block_status_updated_at,
          updated_at = now()
        where messenger_message_match.{p}_block_status <> 1
        "#
    );
    let side = m.side(layer);
    let res = sqlx::query(&sql)
        .bind(&m.msg_hash)
        .bind(to_db_number(side.block_number)?)
        .bind(&side.tx_hash)
        .bind(side.block_status.code())
        .bind(side.status_updated_at)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("messenger upsert failed layer={layer} msg_hash={}", m.msg_hash))?;
    Ok(res.rows_affected())
}

async fn upsert_gateway(
    conn: &mut PgConnection,
    layer: Layer,
    g: &GatewayMessageMatch,
) -> Result<u64> {
    let p = layer.as_str();
    let sql = format!(
        r#"
        insert into gateway_message_match
          (msg_hash, token_type, {p}_block_number, {p}_tx_hash, {p}_block_status,
           {p}_block_status_updated_at, {p}_amounts, {p}_token_ids)
        values ($1, $2, $3, $4, $5, $6, $7, $8)
        on conflict (msg_hash) do update set
          {p}_block_number = excluded.{p}_block_number,
          {p}_tx_hash = excluded.{p}_tx_hash,
          {p}_block_status = excluded.{p}_block_status,
          {p}_block_status_updated_at = excluded.{p}_block_status_updated_at,
          {p}_amounts = excluded.{p}_amounts,
          {p}_token_ids = excluded.{p}_token_ids,
          updated_at = now()
        where gateway_message_match.{p}_block_status <> 1
        "#
    );
    let side = g.side(layer);
    let res = sqlx::query(&sql)
        .bind(&g.msg_hash)
        .bind(g.token_type.code())
        .bind(to_db_number(side.block_number)?)
        .bind(&side.tx_hash)
        .bind(side.block_status.code())
        .bind(side.status_updated_at)
        .bind(g.amounts(layer))
        .bind(g.token_ids(layer))
        .execute(&mut *conn)
        .await
        .with_context(|| format!("gateway upsert failed layer={layer} msg_hash={}", g.msg_hash))?;
    Ok(res.rows_affected())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

const MESSENGER_COLUMNS: &str = "msg_hash, \
    l1_block_number, l1_tx_hash, l1_block_status, l1_block_status_updated_at, \
    l2_block_number, l2_tx_hash, l2_block_status, l2_block_status_updated_at";

/// Most recent messenger match whose `layer` status is valid.
pub async fn latest_valid_messenger_match(
    pool: &PgPool,
    layer: Layer,
) -> Result<Option<MessengerMessageMatch>> {
    let p = layer.as_str();
    let sql = format!(
        "select {MESSENGER_COLUMNS} from messenger_message_match \
         where {p}_block_status = 1 \
         order by {p}_block_number desc, id desc \
         limit 1"
    );
    let row = sqlx::query(&sql)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("latest_valid_messenger_match failed layer={layer}"))?;
    row.as_ref().map(messenger_from_row).transpose()
}

pub async fn fetch_messenger_match(
    pool: &PgPool,
    msg_hash: &str,
) -> Result<Option<MessengerMessageMatch>> {
    let sql = format!("select {MESSENGER_COLUMNS} from messenger_message_match where msg_hash = $1");
    let row = sqlx::query(&sql)
        .bind(msg_hash)
        .fetch_optional(pool)
        .await
        .context("fetch_messenger_match failed")?;
    row.as_ref().map(messenger_from_row).transpose()
}

pub async fn fetch_gateway_match(
    pool: &PgPool,
    msg_hash: &str,
) -> Result<Option<GatewayMessageMatch>> {
    let row = sqlx::query(
        r#"
        select msg_hash, token_type,
               l1_block_number, l1_tx_hash, l1_block_status, l1_block_status_updated_at,
               l2_block_number, l2_tx_hash, l2_block_status, l2_block_status_updated_at,
               l1_amounts, l2_amounts, l1_token_ids, l2_token_ids
        from gateway_message_match
        where msg_hash = $1
        "#,
    )
    .bind(msg_hash)
    .fetch_optional(pool)
    .await
    .context("fetch_gateway_match failed")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let code: i16 = row.try_get("token_type")?;
    Ok(Some(GatewayMessageMatch {
        msg_hash: row.try_get("msg_hash")?,
        token_type: TokenType::from_code(code)
            .ok_or_else(|| anyhow!("unknown token_type code {code}"))?,
        l1: side_from_row(&row, Layer::L1)?,
        l2: side_from_row(&row, Layer::L2)?,
        l1_amounts: row.try_get("l1_amounts")?,
        l2_amounts: row.try_get("l2_amounts")?,
        l1_token_ids: row.try_get("l1_token_ids")?,
        l2_token_ids: row.try_get("l2_token_ids")?,
    }))
}

fn messenger_from_row(row: &PgRow) -> Result<MessengerMessageMatch> {
    Ok(MessengerMessageMatch {
        msg_hash: row.try_get("msg_hash")?,
        l1: side_from_row(row, Layer::L1)?,
        l2: side_from_row(row, Layer::L2)?,
    })
}

fn side_from_row(row: &PgRow, layer: Layer) -> Result<MatchSide> {
    let p = layer.as_str();
    let status: i16 = row.try_get(format!("{p}_block_status").as_str())?;
    Ok(MatchSide {
        block_number: from_db_number(row.try_get(format!("{p}_block_number").as_str())?)?,
        tx_hash: row.try_get(format!("{p}_tx_hash").as_str())?,
        block_status: BlockStatus::from_code(status)
            .ok_or_else(|| anyhow!("unknown {p}_block_status code {status}"))?,
        status_updated_at: row.try_get(format!("{p}_block_status_updated_at").as_str())?,
    })
}
