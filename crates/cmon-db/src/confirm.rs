use anyhow::{Context, Result};
use cmon_reconcile::{BlockWindow, ChainConfirm, MismatchSet, ASSET_CLASSES};
use sqlx::{PgPool, Row};

use crate::events::load_deposit_pairs;
use crate::{from_db_number, to_db_number};

/// Highest confirmed L2 block, `0` when nothing has been confirmed yet.
pub async fn latest_confirmed_number(pool: &PgPool) -> Result<u64> {
    let (n,): (Option<i64>,) =
        sqlx::query_as::<_, (Option<i64>,)>("select max(number) from chain_confirm where confirm")
            .fetch_one(pool)
            .await
            .context("latest_confirmed_number failed")?;
    n.map(from_db_number).transpose().map(|n| n.unwrap_or(0))
}

/// Reconcile and confirm one window in a single transaction.
///
/// 1. Run the join read for every asset class and collect the mismatches.
/// 2. Upsert every block in the window to `confirm = true, deposit_status = true`.
/// 3. Set `deposit_status = false` for the mismatching blocks.
///
/// Any error drops the transaction, which rolls everything back: no block of
/// the window is left confirmed.
pub async fn confirm_deposit_window(pool: &PgPool, window: BlockWindow) -> Result<MismatchSet> {
    let mut tx = pool.begin().await.context("confirm_deposit_window begin failed")?;

    let mut set = MismatchSet::new();
    for desc in ASSET_CLASSES.iter() {
        let pairs = load_deposit_pairs(&mut tx, desc, window).await?;
        set.absorb(desc, &pairs);
    }

    let start = to_db_number(window.start)?;
    let end = to_db_number(window.end)?;

    sqlx::query(
        r#"
        insert into chain_confirm (number, deposit_status, confirm, updated_at)
        select n, true, true, now()
        from generate_series($1::bigint, $2::bigint) as n
        on conflict (number) do update set
          deposit_status = true,
          confirm = true,
          updated_at = now()
        "#,
    )
    .bind(start)
    .bind(end)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("chain_confirm range upsert failed window={window}"))?;

    if !set.is_clean() {
        let failed = set
            .failed_numbers()
            .into_iter()
            .map(to_db_number)
            .collect::<Result<Vec<i64>>>()?;
        sqlx::query(
            r#"
            update chain_confirm
            set deposit_status = false, updated_at = now()
            where number = any($1)
            "#,
        )
        .bind(&failed)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("chain_confirm failed-number update failed window={window}"))?;
    }

    tx.commit()
        .await
        .with_context(|| format!("confirm_deposit_window commit failed window={window}"))?;

    Ok(set)
}

/// Rows in `window`, ascending. Blocks never written are absent.
pub async fn fetch_chain_confirm(pool: &PgPool, window: BlockWindow) -> Result<Vec<ChainConfirm>> {
    let rows = sqlx::query(
        r#"
        select number, deposit_status, confirm
        from chain_confirm
        where number between $1 and $2
        order by number asc
        "#,
    )
    .bind(to_db_number(window.start)?)
    .bind(to_db_number(window.end)?)
    .fetch_all(pool)
    .await
    .context("fetch_chain_confirm failed")?;

    rows.into_iter()
        .map(|row| -> Result<ChainConfirm> {
            Ok(ChainConfirm {
                number: from_db_number(row.try_get("number")?)?,
                deposit_status: row.try_get("deposit_status")?,
                confirm: row.try_get("confirm")?,
            })
        })
        .collect()
}
