//! Reconciliation engine.
//!
//! # Purpose
//!
//! Walks L2 blocks forward in windows of at most `batch_size`, matching every
//! L2 finalize-deposit event against its L1 origin and recording the result
//! per block in `chain_confirm`.
//!
//! # Invariants
//!
//! - **Upstream ready**: nothing is matched while the L1 watcher lags its own
//!   safe tip; missing L1 rows would read as mismatches.
//! - **Bounded by L2**: a window is planned below the L2 safe number and
//!   then cut back to the L2 ingested number.
//! - **Atomic window**: a window is confirmed entirely or not at all.
//! - **Monotonic**: `last_confirmed` only moves forward, and only after a
//!   successful commit.
//! - **Notify after commit**: mismatch alerts are sent for committed windows only.

use std::sync::Arc;
use std::time::Duration;

use cmon_reconcile::{plan_window, BlockWindow, WatermarkSource, WindowPlan, DEFAULT_BATCH_SIZE};
use serde::Serialize;
use tokio::sync::watch;

use crate::notify::{Anomaly, Notifier};
use crate::store::ConfirmStore;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub batch_size: u64,
    /// Pause between ticks after a committed window.
    pub tick_interval: Duration,
    pub upstream_backoff: Duration,
    pub downstream_backoff: Duration,
    pub failure_backoff: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tick_interval: Duration::from_secs(1),
            upstream_backoff: Duration::from_secs(5),
            downstream_backoff: Duration::from_secs(3),
            failure_backoff: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// What one tick did. Not-ready states and commit failures are outcomes, not
/// errors: the next tick retries the same window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// L1 ingestion has not caught up with the L1 safe tip.
    UpstreamNotReady { start_number: u64, safe_number: u64 },
    /// Even the first block of the next window lies above the L2 ceiling.
    AwaitingSafe { window: BlockWindow, ceiling: u64 },
    /// L2 ingestion has not passed the last confirmed block.
    DownstreamBehind { last_confirmed: u64, ingested: u64 },
    Confirmed {
        window: BlockWindow,
        failed_numbers: Vec<u64>,
    },
    CommitFailed { window: BlockWindow, error: String },
}

impl TickOutcome {
    /// How long to wait before the next tick.
    pub fn backoff(&self, settings: &MonitorSettings) -> Duration {
        match self {
            TickOutcome::UpstreamNotReady { .. } => settings.upstream_backoff,
            TickOutcome::AwaitingSafe { .. } | TickOutcome::DownstreamBehind { .. } => {
                settings.downstream_backoff
            }
            TickOutcome::CommitFailed { .. } => settings.failure_backoff,
            TickOutcome::Confirmed { .. } => Duration::ZERO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TickOutcome::UpstreamNotReady { .. } => "upstream_not_ready",
            TickOutcome::AwaitingSafe { .. } => "awaiting_safe",
            TickOutcome::DownstreamBehind { .. } => "downstream_behind",
            TickOutcome::Confirmed { .. } => "confirmed",
            TickOutcome::CommitFailed { .. } => "commit_failed",
        }
    }
}

/// Snapshot published after every tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStatus {
    pub last_confirmed: u64,
    pub ticks: u64,
    pub last_outcome: Option<TickOutcome>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ChainMonitor {
    store: Arc<dyn ConfirmStore>,
    l1: Arc<dyn WatermarkSource>,
    l2: Arc<dyn WatermarkSource>,
    notifier: Arc<dyn Notifier>,
    settings: MonitorSettings,
    last_confirmed: u64,
    status_tx: watch::Sender<MonitorStatus>,
}

impl ChainMonitor {
    /// Seeds `last_confirmed` from the store.
    pub async fn new(
        store: Arc<dyn ConfirmStore>,
        l1: Arc<dyn WatermarkSource>,
        l2: Arc<dyn WatermarkSource>,
        notifier: Arc<dyn Notifier>,
        settings: MonitorSettings,
    ) -> anyhow::Result<Self> {
        let last_confirmed = store.latest_confirmed_number().await?;
        let (status_tx, _rx) = watch::channel(MonitorStatus {
            last_confirmed,
            ..Default::default()
        });
        tracing::info!(last_confirmed, batch_size = settings.batch_size, "chain monitor seeded");
        Ok(Self {
            store,
            l1,
            l2,
            notifier,
            settings,
            last_confirmed,
            status_tx,
        })
    }

    pub fn last_confirmed(&self) -> u64 {
        self.last_confirmed
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Run at most one reconciliation batch.
    pub async fn tick(&mut self) -> TickOutcome {
        let outcome = self.tick_inner().await;
        self.status_tx.send_modify(|s| {
            s.last_confirmed = self.last_confirmed;
            s.ticks += 1;
            s.last_outcome = Some(outcome.clone());
        });
        outcome
    }

    async fn tick_inner(&mut self) -> TickOutcome {
        if !self.l1.is_ready() {
            let start_number = self.l1.start_number();
            let safe_number = self.l1.safe_number();
            tracing::debug!(start_number, safe_number, "l1 watcher not ready");
            return TickOutcome::UpstreamNotReady {
                start_number,
                safe_number,
            };
        }

        let safe = self.l2.safe_number();
        let planned = match plan_window(self.last_confirmed, self.settings.batch_size, safe) {
            WindowPlan::Ready(window) => window,
            WindowPlan::AwaitCeiling { window, ceiling } => {
                tracing::debug!(start = window.start, ceiling, "waiting for l2 safe number");
                return TickOutcome::AwaitingSafe { window, ceiling };
            }
        };

        // Read after `safe`; the watcher may have moved in between.
        let ingested = self.l2.start_number();
        if ingested <= self.last_confirmed {
            tracing::debug!(
                last_confirmed = self.last_confirmed,
                ingested,
                "l2 ingestion behind last confirmed block"
            );
            return TickOutcome::DownstreamBehind {
                last_confirmed: self.last_confirmed,
                ingested,
            };
        }

        // Never confirm blocks whose events are not stored yet.
        let window = BlockWindow {
            start: planned.start,
            end: planned.end.min(ingested),
        };

        match self.store.confirm_window(window).await {
            Ok(set) => {
                self.last_confirmed = self.last_confirmed.max(window.end);
                let failed_numbers = set.failed_numbers();
                tracing::info!(
                    start = window.start,
                    end = window.end,
                    failed = failed_numbers.len(),
                    "window confirmed"
                );
                for m in set.into_mismatches() {
                    self.notifier.notify(&Anomaly::DepositMismatch(m));
                }
                TickOutcome::Confirmed {
                    window,
                    failed_numbers,
                }
            }
            Err(err) => {
                let error = format!("{err:#}");
                tracing::error!(
                    start = window.start,
                    end = window.end,
                    error = %error,
                    "window commit failed; will retry"
                );
                TickOutcome::CommitFailed { window, error }
            }
        }
    }

    /// Tick until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// A shutdown that arrives mid-tick drops the in-flight tick; an open
    /// transaction is rolled back and `last_confirmed` is unchanged.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(last_confirmed = self.last_confirmed, "chain monitor started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.tick() => outcome,
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let mut wait = outcome.backoff(&self.settings);
            if wait.is_zero() {
                wait = self.settings.tick_interval;
            }

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(last_confirmed = self.last_confirmed, "chain monitor stopped");
    }
}
