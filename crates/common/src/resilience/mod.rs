//! Resilience patterns for fault tolerance
//!
//! Generic, reusable building blocks for operations that touch an
//! unreliable network:
//! - **Retry policy**: deterministic capped exponential backoff schedules
//! - **Bulkhead**: admission gate bounding concurrent operations
//!
//! Both are mechanism only. Deciding *whether* a particular failure is
//! retryable stays with the caller, which knows its protocol.

pub mod bulkhead;
pub mod retry;

// Re-export bulkhead types
pub use bulkhead::{
    Bulkhead, BulkheadConfig, BulkheadConfigBuilder, BulkheadError, BulkheadMetrics, BulkheadPermit,
};
// Re-export retry types
pub use retry::{RetryPolicy, RetryPolicyBuilder};
