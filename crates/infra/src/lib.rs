//! # VeriScan Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite pending queue and record cache)
//! - HTTP client for the ledger service API
//! - Configuration loading (environment and files)
//!
//! ## Architecture
//! - Implements traits defined in `veriscan-core`
//! - Depends on `veriscan-common` and `veriscan-core`
//! - Contains all "impure" code (I/O, network, clock)

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;

// Re-export commonly used items
pub use api::*;
pub use database::*;
pub use errors::*;
pub use http::*;
