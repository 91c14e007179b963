//! Keys no consumer reads are surfaced: a warning by default, an error
//! under `UnusedKeyPolicy::Fail`.

use cmon_config::{
    consumed_pointers, load_layered_yaml_from_strings, report_unused_keys, ConfigConsumer,
    UnusedKeyPolicy,
};

const YAML: &str = r#"
l1:
  start_number: 100
  contracts:
    scroll_messenger: "0x6774bcbd5cecef1336b5300fb5186a12ddd8b367"
monitor:
  batch_size: 500
  tick_interval_ms: 1000
  batch_sizee: 7
daemon:
  addr: "127.0.0.1:8899"
"#;

#[test]
fn daemon_reports_typo_key_as_unused() {
    let cfg = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Daemon, &cfg.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/monitor/batch_sizee".to_string()]);
    assert!(!report.is_clean());
}

#[test]
fn fail_policy_turns_unused_keys_into_error() {
    let cfg = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigConsumer::Daemon, &cfg.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("consumer=DAEMON"));
    assert!(msg.contains("/monitor/batch_sizee"));
}

#[test]
fn cli_does_not_consume_daemon_sections() {
    let cfg = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Cli, &cfg.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report.unused_leaf_pointers.contains(&"/daemon/addr".to_string()));
    assert!(report.unused_leaf_pointers.contains(&"/monitor/batch_size".to_string()));
    assert!(!report
        .unused_leaf_pointers
        .iter()
        .any(|p| p.starts_with("/l1/")));
}

#[test]
fn prefix_match_respects_segment_boundary() {
    // "/daemon/addr" must not consume "/daemon/address".
    let cfg = load_layered_yaml_from_strings(&["daemon:\n  address: \"x\"\n"]).unwrap();
    let report =
        report_unused_keys(ConfigConsumer::Daemon, &cfg.config_json, UnusedKeyPolicy::Warn)
            .unwrap();
    assert_eq!(report.unused_leaf_pointers, vec!["/daemon/address".to_string()]);
}

#[test]
fn registries_are_non_empty() {
    assert!(!consumed_pointers(ConfigConsumer::Daemon).is_empty());
    assert!(!consumed_pointers(ConfigConsumer::Cli).is_empty());
}
