//! Shared infrastructure utilities for VeriScan crates.
//!
//! Home of the resilience primitives (retry backoff schedules and the
//! bulkhead admission gate) the network layer is built on. Everything here
//! is domain-agnostic; crate-specific policy lives with its caller.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types for convenience
pub use resilience::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadPermit, RetryPolicy};
