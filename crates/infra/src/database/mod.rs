//! Database implementations

pub mod cache_repository;
pub mod manager;
pub mod pending_repository;
pub mod retention;

pub use cache_repository::*;
pub use manager::*;
pub use pending_repository::*;
pub use retention::*;
