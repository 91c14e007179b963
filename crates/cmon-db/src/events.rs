use anyhow::{Context, Result};
use cmon_reconcile::{AssetClassDescriptor, BlockWindow, DepositPair, Layer, MirroredEvent};
use sqlx::{PgConnection, PgPool, Row};

use crate::{from_db_number, to_db_number};

/// Join read for one asset class: every L2 finalize-deposit event of the
/// class inside `window`, left-joined to L1 events by `msg_hash`.
///
/// Takes a connection so the caller can run it inside its transaction.
pub async fn load_deposit_pairs(
    conn: &mut PgConnection,
    desc: &AssetClassDescriptor,
    window: BlockWindow,
) -> Result<Vec<DepositPair>> {
    // Table names come from the static descriptor table, never from input.
    let sql = format!(
        r#"
        select
          l2.msg_hash                as msg_hash,
          l2.number                  as l2_number,
          (l1.msg_hash is not null)  as l1_present,
          l1.amount                  as l1_amount,
          l2.amount                  as l2_amount,
          l1.token_id                as l1_token_id,
          l2.token_id                as l2_token_id
        from {l2} l2
        left join {l1} l1 on l1.msg_hash = l2.msg_hash
        where l2.number between $1 and $2
          and l2.type = any($3)
        order by l2.number asc, l2.id asc
        "#,
        l1 = desc.l1_table,
        l2 = desc.l2_table,
    );

    let rows = sqlx::query(&sql)
        .bind(to_db_number(window.start)?)
        .bind(to_db_number(window.end)?)
        .bind(desc.finalize_codes())
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("load_deposit_pairs failed class={} window={window}", desc.class))?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(DepositPair {
            msg_hash: row.try_get("msg_hash")?,
            l2_number: from_db_number(row.try_get("l2_number")?)?,
            l1_present: row.try_get("l1_present")?,
            l1_amount: row.try_get("l1_amount")?,
            l2_amount: row.try_get("l2_amount")?,
            l1_token_id: row.try_get("l1_token_id")?,
            l2_token_id: row.try_get("l2_token_id")?,
        });
    }
    Ok(out)
}

/// Write one mirrored event row. Ingestion owns these tables; the monitor
/// only uses this for seeding and tests.
pub async fn insert_mirrored_event(
    pool: &PgPool,
    layer: Layer,
    desc: &AssetClassDescriptor,
    ev: &MirroredEvent,
    tx_hash: &str,
) -> Result<()> {
    let table = match layer {
        Layer::L1 => desc.l1_table,
        Layer::L2 => desc.l2_table,
    };
    let sql = format!(
        "insert into {table} (msg_hash, number, type, amount, token_id, tx_hash) \
         values ($1, $2, $3, $4, $5, $6)"
    );
    sqlx::query(&sql)
        .bind(&ev.msg_hash)
        .bind(to_db_number(ev.number)?)
        .bind(ev.event_type)
        .bind(&ev.amount)
        .bind(&ev.token_id)
        .bind(tx_hash)
        .execute(pool)
        .await
        .with_context(|| format!("insert_mirrored_event failed table={table}"))?;
    Ok(())
}
