//! Layered YAML configuration for the chain monitor.
//!
//! - YAML documents are merged in order (later layers win) into one JSON value.
//! - Literal secrets are refused; config carries env var NAMES only.
//! - The canonical JSON is hashed (SHA-256) so a running process can report
//!   exactly which configuration it was started with.
//! - Leaves not read by a given consumer are reported as unused.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

mod monitor;

pub use monitor::{
    AddressError, ContractAddress, DaemonSection, GatewayContracts, L1Contracts, L1Section,
    L2Contracts, L2Section, MonitorConfig, MonitorSection, DEFAULT_DAEMON_ADDR,
    DEFAULT_TICK_INTERVAL_MS,
};

/// Prefixes of values that must never appear as config literals.
const SECRET_PREFIXES: &[&str] = &[
    "-----BEGIN",               // PEM private keys
    "xoxb-",                    // Slack bot token
    "xoxp-",                    // Slack user token
    "https://hooks.slack.com/", // Slack incoming webhook (auth is in the URL)
    "postgres://",              // DSN with embedded credentials
    "postgresql://",
];

// ---------------------------------------------------------------------------
// Unused-key report
// ---------------------------------------------------------------------------

/// Which process is reading the config. Each reads a different subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigConsumer {
    Daemon,
    Cli,
}

impl ConfigConsumer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigConsumer::Daemon => "DAEMON",
            ConfigConsumer::Cli => "CLI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub consumer: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes each consumer actually reads.
///
/// A leaf under any listed prefix counts as consumed. Keep this in step with
/// the fields of [`MonitorConfig`] and the code paths that use them.
pub fn consumed_pointers(consumer: ConfigConsumer) -> &'static [&'static str] {
    match consumer {
        ConfigConsumer::Daemon => &[
            "/l1/start_number",
            "/l1/contracts",
            "/l2/contracts",
            "/monitor/batch_size",
            "/monitor/tick_interval_ms",
            "/daemon/addr",
        ],
        // `cmon match latest-block` needs the L1 cold-start number; the
        // address tables are validated on load.
        ConfigConsumer::Cli => &["/l1/start_number", "/l1/contracts", "/l2/contracts"],
    }
}

/// Produce an unused-key report for `consumer`.
/// With `UnusedKeyPolicy::Fail`, unused keys are an error.
pub fn report_unused_keys(
    consumer: ConfigConsumer,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed_pointers(consumer)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let unused: BTreeSet<String> = leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|ptr| !consumed_prefixes.iter().any(|c| consumes(c, ptr)))
        .collect();

    let report = UnusedKeyReport {
        consumer: consumer.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if !report.is_clean() {
        match policy {
            UnusedKeyPolicy::Fail => bail!(
                "CONFIG_UNUSED_KEYS (consumer={}): {} key(s) not read by this process: {:?}",
                report.consumer,
                report.unused_leaf_pointers.len(),
                &report.unused_leaf_pointers[..report.unused_leaf_pointers.len().min(12)]
            ),
            UnusedKeyPolicy::Warn => tracing::warn!(
                consumer = report.consumer.as_str(),
                unused = ?report.unused_leaf_pointers,
                "config contains unused keys"
            ),
        }
    }

    Ok(report)
}

/// `"a/b/"` -> `"/a/b"`. Empty input is the root pointer.
fn normalize_pointer(p: &str) -> String {
    let trimmed = p.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but not "/a/bc".
fn consumes(prefix: &str, leaf: &str) -> bool {
    prefix == "/"
        || leaf == prefix
        || leaf
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Every scalar leaf of `v` with its JSON pointer, in key order.
/// Empty objects and arrays contribute nothing.
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    walk_leaves(v, String::new(), &mut out);
    out
}

fn walk_leaves<'a>(v: &'a Value, at: String, out: &mut Vec<(String, &'a Value)>) {
    match v {
        Value::Object(map) => {
            for (key, child) in map {
                let token = key.replace('~', "~0").replace('/', "~1");
                walk_leaves(child, format!("{at}/{token}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_leaves(child, format!("{at}/{i}"), out);
            }
        }
        leaf => {
            let ptr = if at.is_empty() { "/".to_string() } else { at };
            out.push((ptr, leaf));
        }
    }
}

// ---------------------------------------------------------------------------
// Layered load + hash
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Deserialize and validate the typed monitor view.
    pub fn monitor(&self) -> Result<MonitorConfig> {
        MonitorConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml<P: AsRef<str>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::with_capacity(paths.len());
    for p in paths {
        let p = p.as_ref();
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json's default map is ordered by key, so this is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    for (ptr, leaf) in leaves(v) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

/// Known secret prefixes, or a bare 32-byte hex string (an EOA private key).
fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    if SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) {
        return true;
    }
    let hex_body = t.strip_prefix("0x").unwrap_or(t);
    hex_body.len() == 64 && hex_body.chars().all(|c| c.is_ascii_hexdigit())
}
