//! Error types used throughout the application
//!
//! Every failure surfaced to a caller belongs to one taxonomy variant, and
//! every variant has a stable machine code plus a fixed user-facing message.
//! A duplicate capture is a business outcome, not an error, so it never
//! appears here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for VeriScan
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VeriScanError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Server error [{code}]: {message}")]
    Server { code: String, message: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VeriScanError {
    /// Stable lowercase category name, used in logs and metrics fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Auth(_) => "auth",
            Self::Server { .. } => "server",
            Self::Parse(_) => "parse",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Machine-readable error code surfaced to callers.
    ///
    /// Server errors preserve the code the remote service returned
    /// (e.g. `INVALID_URL`, `DGI_ERROR`); every other variant maps to a
    /// fixed local code.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Server { code, .. } => code,
            Self::Parse(_) => "PARSE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may reasonably retry the operation.
    ///
    /// Network, timeout, and server-side failures are worth retrying once
    /// connectivity or the service recovers. Validation, auth, parse,
    /// storage, and config failures will fail the same way again.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Server { .. })
    }

    /// Fixed presentation message keyed by the taxonomy variant.
    ///
    /// Server business messages are surfaced verbatim; everything else maps
    /// to a constant string so internal detail never leaks to the UI.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Le code scanné n'est pas une facture valide.".to_string(),
            Self::Network(_) => "Connexion impossible. Vérifiez votre réseau.".to_string(),
            Self::Timeout(_) => "Le serveur ne répond pas. Réessayez plus tard.".to_string(),
            Self::Auth(_) => "Session expirée. Veuillez vous reconnecter.".to_string(),
            Self::Server { message, .. } => message.clone(),
            Self::Parse(_) => "Réponse du serveur illisible.".to_string(),
            Self::Storage(_) => "Erreur de stockage local.".to_string(),
            Self::Config(_) => "Configuration invalide.".to_string(),
            Self::Internal(_) => "Une erreur inattendue s'est produite.".to_string(),
        }
    }
}

/// Result type alias for VeriScan operations
pub type Result<T> = std::result::Result<T, VeriScanError>;
