//! Batch window planning.
//!
//! The engine reconciles L2 blocks in contiguous windows of at most
//! `batch_size` blocks starting right after the last confirmed block. The
//! window is clamped below a *ceiling* (the downstream chain's settled tip),
//! so nothing that could still be reorganized is ever confirmed.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: u64 = 500;

/// Inclusive range of L2 block numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockWindow {
    pub start: u64,
    pub end: u64,
}

impl BlockWindow {
    /// Returns `None` when `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, number: u64) -> bool {
        self.start <= number && number <= self.end
    }

    pub fn numbers(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Outcome of window planning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPlan {
    /// Window lies entirely at or below the ceiling; safe to reconcile.
    Ready(BlockWindow),
    /// Even the first block of the window is above the ceiling. The window is
    /// the zero-width probe `[start, start]` and must not be committed.
    AwaitCeiling { window: BlockWindow, ceiling: u64 },
}

impl WindowPlan {
    pub fn window(&self) -> BlockWindow {
        match self {
            WindowPlan::Ready(w) => *w,
            WindowPlan::AwaitCeiling { window, .. } => *window,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WindowPlan::Ready(_))
    }
}

/// Compute the next window after `last_confirmed`.
///
/// - Nominal window: `[last + 1, last + batch_size]`.
/// - If the nominal end reaches the ceiling: `[start, ceiling - 1]`.
/// - If `start` itself is not below the ceiling: probe `[start, start]`,
///   ready only when `start == ceiling`.
///
/// A `batch_size` of zero is treated as one.
pub fn plan_window(last_confirmed: u64, batch_size: u64, ceiling: u64) -> WindowPlan {
    let start = last_confirmed.saturating_add(1);
    let end = start.saturating_add(batch_size.max(1) - 1);

    let window = if end < ceiling {
        BlockWindow { start, end }
    } else if start < ceiling {
        BlockWindow {
            start,
            end: ceiling - 1,
        }
    } else {
        BlockWindow { start, end: start }
    };

    if window.end > ceiling {
        WindowPlan::AwaitCeiling { window, ceiling }
    } else {
        WindowPlan::Ready(window)
    }
}
