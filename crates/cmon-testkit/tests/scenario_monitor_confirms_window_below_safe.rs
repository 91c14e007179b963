//! Scenario: Monitor Confirms Window Below L2 Safe Number
//!
//! # Invariant under test
//! With `last_confirmed = 1000`, `batch_size = 500` and the L2 safe number at
//! 1300, exactly blocks 1001..=1299 are confirmed in one window. A block
//! holding a deposit whose L1 amount disagrees is confirmed with a failed
//! deposit status; every other block in the window is confirmed clean.
//!
//! All tests are pure in-process; no DB or network required.

use std::sync::Arc;

use cmon_reconcile::{
    AssetClass, BlockWindow, ChainConfirm, ChainWatermark, EventType, Layer, MirroredEvent,
};
use cmon_runtime::{Anomaly, ChainMonitor, MonitorSettings, TickOutcome};
use cmon_testkit::{MemStore, RecordingNotifier};

fn erc20(msg_hash: &str, number: u64, amount: &str) -> MirroredEvent {
    MirroredEvent {
        msg_hash: msg_hash.to_string(),
        number,
        event_type: EventType::FinalizeDepositStandardErc20.code(),
        amount: Some(amount.to_string()),
        token_id: None,
    }
}

struct Rig {
    store: Arc<MemStore>,
    notifier: Arc<RecordingNotifier>,
    l2: Arc<ChainWatermark>,
    monitor: ChainMonitor,
}

async fn rig(last_confirmed: u64, l2_start: u64, l2_safe: u64) -> Rig {
    let store = Arc::new(MemStore::new());
    if last_confirmed > 0 {
        store.put_chain_confirm(ChainConfirm {
            number: last_confirmed,
            deposit_status: true,
            confirm: true,
        });
    }
    let notifier = Arc::new(RecordingNotifier::new());
    let l1 = Arc::new(ChainWatermark::with_numbers(Layer::L1, 5_000, 5_000));
    let l2 = Arc::new(ChainWatermark::with_numbers(Layer::L2, l2_start, l2_safe));
    let monitor = ChainMonitor::new(
        store.clone(),
        l1,
        l2.clone(),
        notifier.clone(),
        MonitorSettings::default(),
    )
    .await
    .unwrap();
    Rig {
        store,
        notifier,
        l2,
        monitor,
    }
}

// ---------------------------------------------------------------------------
// 1. Window is [1001, 1299] and the mismatching block is flagged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mismatching_amount_fails_only_its_block() {
    let mut r = rig(1000, 1400, 1300).await;
    r.store
        .push_event(Layer::L1, AssetClass::Erc20, erc20("0xab", 77, "49"));
    r.store
        .push_event(Layer::L2, AssetClass::Erc20, erc20("0xab", 1200, "50"));

    let outcome = r.monitor.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Confirmed {
            window: BlockWindow { start: 1001, end: 1299 },
            failed_numbers: vec![1200],
        }
    );
    assert_eq!(r.monitor.last_confirmed(), 1299);

    for n in 1001..=1299 {
        let row = r.store.chain_confirm(n).expect("row for every block");
        assert!(row.confirm, "block {n} confirmed");
        assert_eq!(row.deposit_status, n != 1200, "block {n} deposit status");
    }
    assert!(r.store.chain_confirm(1300).is_none());

    let anomalies = r.notifier.anomalies();
    assert_eq!(anomalies.len(), 1);
    match &anomalies[0] {
        Anomaly::DepositMismatch(m) => {
            assert_eq!(m.msg_hash, "0xab");
            assert_eq!(m.l2_number, 1200);
            assert_eq!(m.class, AssetClass::Erc20);
        }
        other => panic!("unexpected anomaly: {other}"),
    }
}

// ---------------------------------------------------------------------------
// 2. Matching amounts leave the whole window clean
// ---------------------------------------------------------------------------

#[tokio::test]
async fn matching_amount_confirms_clean_window() {
    let mut r = rig(1000, 1400, 1300).await;
    r.store
        .push_event(Layer::L1, AssetClass::Erc20, erc20("0xab", 77, "50"));
    r.store
        .push_event(Layer::L2, AssetClass::Erc20, erc20("0xab", 1200, "50"));

    match r.monitor.tick().await {
        TickOutcome::Confirmed { failed_numbers, .. } => assert!(failed_numbers.is_empty()),
        other => panic!("expected confirmed, got {other:?}"),
    }
    assert!(r.store.chain_confirm(1200).unwrap().deposit_status);
    assert_eq!(r.notifier.count(), 0);
}

// ---------------------------------------------------------------------------
// 3. Window is cut back to the L2 ingested number
// ---------------------------------------------------------------------------

#[tokio::test]
async fn window_never_passes_ingested_block() {
    let mut r = rig(1000, 1100, 1300).await;
    let outcome = r.monitor.tick().await;
    assert_eq!(
        outcome,
        TickOutcome::Confirmed {
            window: BlockWindow { start: 1001, end: 1100 },
            failed_numbers: vec![],
        }
    );
    assert!(r.store.chain_confirm(1101).is_none());
}

// ---------------------------------------------------------------------------
// 4. Nothing to do while L2 ingestion has not passed last_confirmed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn downstream_behind_writes_nothing() {
    let mut r = rig(1000, 1000, 1300).await;
    assert_eq!(
        r.monitor.tick().await,
        TickOutcome::DownstreamBehind {
            last_confirmed: 1000,
            ingested: 1000,
        }
    );
    assert_eq!(r.store.confirm_calls(), 0);

    r.l2.advance(1300, 1300);
    assert!(matches!(r.monitor.tick().await, TickOutcome::Confirmed { .. }));
    assert_eq!(r.monitor.last_confirmed(), 1299);
}

// ---------------------------------------------------------------------------
// 5. Safe number at the next block yields a one-block window, then waits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn catching_up_to_safe_then_waiting() {
    let mut r = rig(1299, 1300, 1300).await;
    assert_eq!(
        r.monitor.tick().await,
        TickOutcome::Confirmed {
            window: BlockWindow { start: 1300, end: 1300 },
            failed_numbers: vec![],
        }
    );

    let outcome = r.monitor.tick().await;
    assert!(
        matches!(outcome, TickOutcome::AwaitingSafe { ceiling: 1300, .. }),
        "got {outcome:?}"
    );
    assert_eq!(r.monitor.last_confirmed(), 1300);
    assert_eq!(r.store.confirm_calls(), 1);
}

// ---------------------------------------------------------------------------
// 6. Ingestion between last_confirmed and safe: window stops at ingested
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingested_below_safe_caps_window_then_resumes() {
    let mut r = rig(1000, 1250, 1300).await;
    // Mirrored on L2 only after ingestion catches up; must not be judged early.
    r.store
        .push_event(Layer::L1, AssetClass::Erc20, erc20("0xcd", 88, "7"));

    assert_eq!(
        r.monitor.tick().await,
        TickOutcome::Confirmed {
            window: BlockWindow { start: 1001, end: 1250 },
            failed_numbers: vec![],
        }
    );
    assert!(r.store.chain_confirm(1251).is_none());
    assert_eq!(r.monitor.last_confirmed(), 1250);

    r.store
        .push_event(Layer::L2, AssetClass::Erc20, erc20("0xcd", 1260, "7"));
    r.l2.advance(1300, 1300);
    assert_eq!(
        r.monitor.tick().await,
        TickOutcome::Confirmed {
            window: BlockWindow { start: 1251, end: 1299 },
            failed_numbers: vec![],
        }
    );
    assert_eq!(r.notifier.count(), 0);
}
