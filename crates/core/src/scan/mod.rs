//! Capture submission and duplicate classification

pub mod service;

pub use service::ScanService;
