use std::fmt;

use cmon_reconcile::{DepositMismatch, Layer, MatchKind};

/// Data-integrity anomaly surfaced to operators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anomaly {
    /// A committed window contained an L2 deposit that disagrees with L1.
    DepositMismatch(DepositMismatch),
    /// A registrar batch tried to re-assert an already-valid layer.
    DuplicateMatch {
        layer: Layer,
        kind: MatchKind,
        msg_hash: String,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DepositMismatch(m) => write!(f, "deposit mismatch: {m}"),
            Anomaly::DuplicateMatch {
                layer,
                kind,
                msg_hash,
            } => write!(
                f,
                "duplicated {kind} message match on {layer}: msg_hash={msg_hash}"
            ),
        }
    }
}

/// Fire-and-forget anomaly sink.
///
/// Implementations must not block for long and must swallow their own
/// delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, anomaly: &Anomaly);
}

/// Logs every anomaly at `error` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, anomaly: &Anomaly) {
        match anomaly {
            Anomaly::DepositMismatch(m) => tracing::error!(
                class = %m.class,
                msg_hash = %m.msg_hash,
                l2_number = m.l2_number,
                "{anomaly}"
            ),
            Anomaly::DuplicateMatch {
                layer,
                kind,
                msg_hash,
            } => tracing::error!(
                layer = %layer,
                kind = %kind,
                msg_hash = %msg_hash,
                "{anomaly}"
            ),
        }
    }
}
