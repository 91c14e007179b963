//! Deposit matching across the four asset classes.

use cmon_reconcile::{
    join_mirrored, match_class, match_window, AssetClass, AssetClassDescriptor, BlockWindow,
    CompareField, DepositMismatch, DepositPair, EventType, MirroredEvent, MismatchReason,
    ASSET_CLASSES,
};

fn ev(msg_hash: &str, number: u64, ty: EventType, amount: Option<&str>, token_id: Option<&str>) -> MirroredEvent {
    MirroredEvent {
        msg_hash: msg_hash.to_string(),
        number,
        event_type: ty.code(),
        amount: amount.map(str::to_string),
        token_id: token_id.map(str::to_string),
    }
}

/// Per-class in-memory event tables, indexed like `ASSET_CLASSES`.
#[derive(Default)]
struct Tables {
    l1: [Vec<MirroredEvent>; 4],
    l2: [Vec<MirroredEvent>; 4],
}

impl Tables {
    fn idx(class: AssetClass) -> usize {
        ASSET_CLASSES.iter().position(|d| d.class == class).unwrap()
    }

    fn push(&mut self, class: AssetClass, l1: Option<MirroredEvent>, l2: MirroredEvent) {
        let i = Self::idx(class);
        if let Some(l1) = l1 {
            self.l1[i].push(l1);
        }
        self.l2[i].push(l2);
    }

    fn run(&self, window: BlockWindow) -> cmon_reconcile::MismatchSet {
        match_window(window, |d| {
            let i = Self::idx(d.class);
            (&self.l1[i][..], &self.l2[i][..])
        })
    }
}

fn window() -> BlockWindow {
    BlockWindow::new(1001, 1500).unwrap()
}

#[test]
fn matching_erc20_amount_leaves_block_clean() {
    let mut t = Tables::default();
    t.push(
        AssetClass::Erc20,
        Some(ev("0xab", 0, EventType::FinalizeDepositStandardErc20, Some("50"), None)),
        ev("0xab", 1200, EventType::FinalizeDepositStandardErc20, Some("50"), None),
    );
    let set = t.run(window());
    assert!(set.is_clean());
    assert!(!set.contains(1200));
}

#[test]
fn differing_erc20_amount_flags_block() {
    let mut t = Tables::default();
    t.push(
        AssetClass::Erc20,
        Some(ev("0xab", 0, EventType::FinalizeDepositStandardErc20, Some("49"), None)),
        ev("0xab", 1200, EventType::FinalizeDepositStandardErc20, Some("50"), None),
    );
    let set = t.run(window());
    assert_eq!(set.failed_numbers(), vec![1200]);

    let m = &set.mismatches()[0];
    assert_eq!(m.class, AssetClass::Erc20);
    assert_eq!(m.msg_hash, "0xab");
    assert_eq!(
        m.reason,
        MismatchReason::FieldMismatch {
            field: CompareField::Amount,
            l1: Some("49".into()),
            l2: Some("50".into()),
        }
    );
}

#[test]
fn amount_comparison_is_string_exact() {
    let desc = AssetClassDescriptor::for_class(AssetClass::Native);
    let pairs = [DepositPair {
        msg_hash: "0x01".into(),
        l2_number: 7,
        l1_present: true,
        l1_amount: Some("100".into()),
        l2_amount: Some("100.0".into()),
        ..Default::default()
    }];
    let out = match_class(desc, &pairs);
    assert_eq!(out.len(), 1, "\"100\" and \"100.0\" must not be coerced to equal");
}

#[test]
fn missing_l1_origin_is_a_mismatch() {
    let mut t = Tables::default();
    t.push(
        AssetClass::Native,
        None,
        ev("0xcd", 1100, EventType::FinalizeDepositEth, Some("1"), None),
    );
    let set = t.run(window());
    assert_eq!(set.failed_numbers(), vec![1100]);
    assert_eq!(set.mismatches()[0].reason, MismatchReason::MissingL1Event);
}

#[test]
fn erc721_mismatch_alone_fails_the_block() {
    let mut t = Tables::default();
    t.push(
        AssetClass::Native,
        Some(ev("0x01", 0, EventType::FinalizeDepositEth, Some("10"), None)),
        ev("0x01", 1300, EventType::FinalizeDepositEth, Some("10"), None),
    );
    t.push(
        AssetClass::Erc20,
        Some(ev("0x02", 0, EventType::FinalizeDepositDai, Some("5"), None)),
        ev("0x02", 1300, EventType::FinalizeDepositDai, Some("5"), None),
    );
    t.push(
        AssetClass::Erc1155,
        Some(ev("0x03", 0, EventType::FinalizeDepositErc1155, Some("2"), Some("9"))),
        ev("0x03", 1300, EventType::FinalizeDepositErc1155, Some("2"), Some("9")),
    );
    t.push(
        AssetClass::Erc721,
        Some(ev("0x04", 0, EventType::FinalizeDepositErc721, None, Some("41"))),
        ev("0x04", 1300, EventType::FinalizeDepositErc721, None, Some("42")),
    );

    let set = t.run(window());
    assert_eq!(set.failed_numbers(), vec![1300]);
    assert_eq!(set.mismatches().len(), 1);
    assert_eq!(set.mismatches()[0].class, AssetClass::Erc721);
}

#[test]
fn erc1155_compares_token_id_and_amount() {
    let desc = AssetClassDescriptor::for_class(AssetClass::Erc1155);
    let base = DepositPair {
        msg_hash: "0x05".into(),
        l2_number: 1,
        l1_present: true,
        l1_amount: Some("3".into()),
        l2_amount: Some("3".into()),
        l1_token_id: Some("1".into()),
        l2_token_id: Some("1".into()),
    };
    assert!(match_class(desc, &[base.clone()]).is_empty());

    let amount_off = DepositPair {
        l2_amount: Some("4".into()),
        ..base.clone()
    };
    let out = match_class(desc, &[amount_off]);
    assert!(matches!(
        out[0].reason,
        MismatchReason::FieldMismatch { field: CompareField::Amount, .. }
    ));

    let id_off = DepositPair {
        l2_token_id: Some("2".into()),
        ..base
    };
    let out = match_class(desc, &[id_off]);
    assert!(matches!(
        out[0].reason,
        MismatchReason::FieldMismatch { field: CompareField::TokenId, .. }
    ));
}

#[test]
fn several_mismatches_in_one_block_flag_it_once() {
    let mut t = Tables::default();
    for (h, amt) in [("0xa1", "2"), ("0xa2", "3")] {
        t.push(
            AssetClass::Native,
            Some(ev(h, 0, EventType::FinalizeDepositEth, Some("1"), None)),
            ev(h, 1400, EventType::FinalizeDepositEth, Some(amt), None),
        );
    }
    let set = t.run(window());
    assert_eq!(set.failed_numbers(), vec![1400]);
    assert_eq!(set.mismatches().len(), 2);
}

#[test]
fn events_outside_window_or_class_are_ignored() {
    let desc = AssetClassDescriptor::for_class(AssetClass::Erc20);
    let l2 = vec![
        ev("0x10", 1000, EventType::FinalizeDepositWeth, Some("1"), None),
        ev("0x11", 1501, EventType::FinalizeDepositWeth, Some("1"), None),
        // Native event type stored in the erc20 table is not an erc20 deposit.
        ev("0x12", 1200, EventType::FinalizeDepositEth, Some("1"), None),
    ];
    assert!(join_mirrored(desc, window(), &[], &l2).is_empty());
}

#[test]
fn matching_is_idempotent() {
    let mut t = Tables::default();
    t.push(
        AssetClass::Erc20,
        Some(ev("0xab", 0, EventType::FinalizeDepositUsdc, Some("49"), None)),
        ev("0xab", 1200, EventType::FinalizeDepositUsdc, Some("50"), None),
    );
    t.push(
        AssetClass::Native,
        None,
        ev("0xef", 1450, EventType::FinalizeDepositEth, Some("1"), None),
    );
    let first = t.run(window());
    let second = t.run(window());
    assert_eq!(first, second);
    assert_eq!(first.failed_numbers(), vec![1200, 1450]);
}

#[test]
fn descriptors_cover_every_event_type_exactly_once() {
    for ty in EventType::ALL {
        let owners = ASSET_CLASSES
            .iter()
            .filter(|d| d.accepts_code(ty.code()))
            .count();
        assert_eq!(owners, 1, "{ty:?}");
    }
}

#[test]
fn mismatch_evidence_serializes_with_reason_tag() {
    let m = DepositMismatch {
        class: AssetClass::Erc721,
        msg_hash: "0x04".into(),
        l2_number: 1300,
        reason: MismatchReason::MissingL1Event,
    };
    let v = serde_json::to_value(&m).unwrap();
    assert_eq!(v["class"], "erc721");
    assert_eq!(v["reason"]["kind"], "missing_l1_event");
    assert!(m.to_string().contains("without L1 origin"));
}
