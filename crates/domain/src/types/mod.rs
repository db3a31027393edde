//! Domain types and models

pub mod identity;
pub mod outcome;
pub mod scan;

// Re-export the working set for convenience
pub use identity::ScanIdentity;
pub use outcome::{SubmitResult, SubmitStatus, SyncOutcome, SyncReport};
pub use scan::{PendingScan, RecordState, ScanRecord, SyncState};
