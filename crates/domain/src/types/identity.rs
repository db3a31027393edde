//! Capture identity extraction

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::IDENTITY_PATTERN;

static IDENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(IDENTITY_PATTERN).expect("IDENTITY_REGEX should compile - this is a bug")
});

/// Normalized deduplication key extracted from a captured payload
///
/// The canonical UUID token embedded in a verification URL, matched
/// case-insensitively and stored lowercase. Two captures of the same
/// invoice always yield the same identity, so queue and cache lookups
/// can use it as their primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanIdentity(String);

impl ScanIdentity {
    /// Extract the identity from a raw scanned payload.
    ///
    /// Finds the leftmost canonical UUID token and normalizes it to
    /// lowercase. Returns `None` when the payload carries no such token.
    pub fn extract(payload: &str) -> Option<Self> {
        IDENTITY_REGEX.find(payload).map(|m| Self(m.as_str().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for ScanIdentity {
    fn from(value: Uuid) -> Self {
        // Uuid renders hyphenated lowercase, which is already canonical
        Self(value.to_string())
    }
}

impl From<ScanIdentity> for String {
    fn from(value: ScanIdentity) -> Self {
        value.0
    }
}
