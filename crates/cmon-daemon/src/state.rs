//! Shared runtime state for cmon-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The chain monitor runs
//! on its own task; the daemon only reads the status it publishes and feeds
//! it watermarks reported by the chain watchers.

use std::sync::Arc;

use cmon_reconcile::{ChainWatermark, Layer, WatermarkSource};
use cmon_runtime::{MessageMatchRegistrar, MonitorStatus, TickOutcome};
use serde::Serialize;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Serialize)]
pub struct WatermarkSnapshot {
    pub start_number: u64,
    pub safe_number: u64,
    pub is_ready: bool,
}

impl WatermarkSnapshot {
    pub fn read(source: &dyn WatermarkSource) -> Self {
        Self {
            start_number: source.start_number(),
            safe_number: source.safe_number(),
            is_ready: source.is_ready(),
        }
    }
}

/// Point-in-time snapshot returned by GET /v1/status.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub last_confirmed: u64,
    pub ticks: u64,
    pub last_outcome: Option<TickOutcome>,
    pub l1: WatermarkSnapshot,
    pub l2: WatermarkSnapshot,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    /// Static build metadata.
    pub build: BuildInfo,
    pub l1: Arc<ChainWatermark>,
    pub l2: Arc<ChainWatermark>,
    pub registrar: Arc<MessageMatchRegistrar>,
    /// Latest status published by the chain monitor task.
    pub monitor: watch::Receiver<MonitorStatus>,
}

impl AppState {
    pub fn new(
        l1: Arc<ChainWatermark>,
        l2: Arc<ChainWatermark>,
        registrar: Arc<MessageMatchRegistrar>,
        monitor: watch::Receiver<MonitorStatus>,
    ) -> Self {
        Self {
            build: BuildInfo {
                service: "cmon-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            l1,
            l2,
            registrar,
            monitor,
        }
    }

    pub fn watermark(&self, layer: Layer) -> &ChainWatermark {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let monitor = self.monitor.borrow().clone();
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            last_confirmed: monitor.last_confirmed,
            ticks: monitor.ticks,
            last_outcome: monitor.last_outcome,
            l1: WatermarkSnapshot::read(self.l1.as_ref()),
            l2: WatermarkSnapshot::read(self.l2.as_ref()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
