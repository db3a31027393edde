//! # VeriScan Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - The scan submission orchestrator
//! - The pending queue sync engine
//!
//! ## Architecture Principles
//! - Only depends on `veriscan-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod scan;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-export specific items to avoid ambiguity
pub use scan::ScanService;
pub use sync::ports::{
    LedgerGateway, PendingQueue, RecordCache, SubmitVerdict, SyncItem, SyncVerdict,
};
pub use sync::SyncEngine;
