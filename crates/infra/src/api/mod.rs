//! Ledger service API client
//!
//! HTTP client for the remote invoice ledger. Wraps every endpoint's
//! envelope protocol, maps service error codes into the domain taxonomy,
//! and signals session expiry through a watch channel.

pub mod client;
pub mod dto;
pub mod session;

pub use client::{LedgerClient, ScanHistory};
pub use dto::{PaginationDto, StatsData};
pub use session::{SessionHandle, SessionStatus};
