//! Pending queue replay and reconciliation

pub mod engine;
pub mod ports;

pub use engine::SyncEngine;
