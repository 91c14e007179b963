//! cmon-runtime
//!
//! Long-running pieces of the chain monitor, independent of any transport:
//!
//! - [`ChainMonitor`]: the reconciliation loop over L2 block windows
//! - [`MessageMatchRegistrar`]: per-layer paired-match upserts with duplicate alerts
//! - [`Notifier`]: fire-and-forget anomaly sink
//! - store traits and their Postgres adapter

mod monitor;
mod notify;
mod registrar;
mod store;

pub use monitor::{ChainMonitor, MonitorSettings, MonitorStatus, TickOutcome};
pub use notify::{Anomaly, Notifier, TracingNotifier};
pub use registrar::{DuplicateMatchError, MessageMatchRegistrar};
pub use store::{ConfirmStore, MatchStore, PgStore, UpsertOutcome};
