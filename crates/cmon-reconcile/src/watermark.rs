//! Chain watermarks.
//!
//! # Purpose
//!
//! Each chain watcher publishes two block numbers:
//!
//! - **start number**: the highest block whose events are fully stored.
//! - **safe number**: the highest block the chain itself treats as final.
//!
//! The reconciliation engine polls both from its own loop while the watcher
//! updates them from another task, so reads are lock-free atomic snapshots.
//!
//! # Invariants
//!
//! - **Non-decreasing**: neither number ever moves backwards. A lower value
//!   offered to [`ChainWatermark::advance`] is refused and reported.
//! - **Independent counters**: the two numbers advance independently; readers
//!   must tolerate one moving between two reads.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Layer;

// ---------------------------------------------------------------------------
// Source contract
// ---------------------------------------------------------------------------

/// Read side of a chain watcher's progress.
///
/// Implementations must guarantee monotonic non-decrease and thread-safe reads.
pub trait WatermarkSource: Send + Sync {
    /// Highest block number whose events are fully ingested.
    fn start_number(&self) -> u64;

    /// Highest block number the chain treats as settled.
    fn safe_number(&self) -> u64;

    /// `true` once ingestion has caught up to the chain's safe tip.
    fn is_ready(&self) -> bool {
        self.start_number() == self.safe_number()
    }
}

// ---------------------------------------------------------------------------
// Movement report
// ---------------------------------------------------------------------------

/// What happened to one counter on an [`ChainWatermark::advance`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Advanced { from: u64, to: u64 },
    Unchanged,
    /// The offered value was lower than the current one and was ignored.
    Refused { current: u64, got: u64 },
}

impl Movement {
    fn observe(previous: u64, offered: u64) -> Self {
        if offered > previous {
            Movement::Advanced {
                from: previous,
                to: offered,
            }
        } else if offered == previous {
            Movement::Unchanged
        } else {
            Movement::Refused {
                current: previous,
                got: offered,
            }
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, Movement::Refused { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatermarkUpdate {
    pub start: Movement,
    pub safe: Movement,
}

impl WatermarkUpdate {
    /// `true` if either offered value tried to move a counter backwards.
    pub fn has_regression(&self) -> bool {
        self.start.is_refused() || self.safe.is_refused()
    }
}

// ---------------------------------------------------------------------------
// Atomic watermark
// ---------------------------------------------------------------------------

/// Reference [`WatermarkSource`] backed by two atomic counters.
#[derive(Debug)]
pub struct ChainWatermark {
    layer: Layer,
    start: AtomicU64,
    safe: AtomicU64,
}

impl ChainWatermark {
    pub fn new(layer: Layer) -> Self {
        Self::with_numbers(layer, 0, 0)
    }

    pub fn with_numbers(layer: Layer, start_number: u64, safe_number: u64) -> Self {
        Self {
            layer,
            start: AtomicU64::new(start_number),
            safe: AtomicU64::new(safe_number),
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Offer new numbers. Each counter only ever moves forward.
    pub fn advance(&self, start_number: u64, safe_number: u64) -> WatermarkUpdate {
        let prev_start = self.start.fetch_max(start_number, Ordering::SeqCst);
        let prev_safe = self.safe.fetch_max(safe_number, Ordering::SeqCst);
        WatermarkUpdate {
            start: Movement::observe(prev_start, start_number),
            safe: Movement::observe(prev_safe, safe_number),
        }
    }
}

impl WatermarkSource for ChainWatermark {
    fn start_number(&self) -> u64 {
        self.start.load(Ordering::SeqCst)
    }

    fn safe_number(&self) -> u64 {
        self.safe.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
