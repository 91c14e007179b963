//! cmon-reconcile
//!
//! Cross-chain deposit reconciliation core.
//!
//! - Watermark sources: per-chain ingested / safe block numbers
//! - Batch window planning bounded by the downstream chain
//! - Per-asset-class deposit matching keyed by message hash
//! - Paired gateway / messenger match rows shared with the registrar
//!
//! Deterministic, pure logic. No IO. No database calls.

mod matcher;
mod types;
mod watermark;
mod window;

pub use matcher::*;
pub use types::*;
pub use watermark::*;
pub use window::*;
