//! Session token storage and expiry signalling
//!
//! The ledger service invalidates sessions server-side; when a request
//! comes back unauthorized the token is dropped and every subscriber is
//! told to re-authenticate.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::info;

/// Authentication state of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No token stored
    Anonymous,
    /// A token is stored and has not been rejected
    Authenticated,
    /// The service rejected the stored token
    Expired,
}

/// Shared handle to the current session token
///
/// Clones share the same token slot and status channel.
#[derive(Debug)]
pub struct SessionHandle {
    token: RwLock<Option<String>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionHandle {
    /// Create a handle, optionally seeded with a stored token
    pub fn new(initial_token: Option<String>) -> Self {
        let status = if initial_token.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        let (status_tx, _) = watch::channel(status);

        Self { token: RwLock::new(initial_token), status_tx }
    }

    /// The token to present as a bearer credential, if any
    pub fn bearer_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Store a fresh token after login
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
        self.status_tx.send_replace(SessionStatus::Authenticated);
    }

    /// Forget the stored token without flagging expiry (logout)
    pub fn clear_token(&self) {
        *self.token.write() = None;
        self.status_tx.send_replace(SessionStatus::Anonymous);
    }

    /// Drop the stored token and broadcast expiry to subscribers
    pub fn notify_expired(&self) {
        *self.token.write() = None;
        if self.status_tx.send_replace(SessionStatus::Expired) != SessionStatus::Expired {
            info!("Session expired, waiting for re-authentication");
        }
    }

    /// Subscribe to session status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Current session status
    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(None)
    }
}
