//! Internal error kinds for the relay, and their wire-facing `info` text.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("hub '{0}' already exists")]
    HubAlreadyExists(String),

    #[error("hub '{0}' not found")]
    HubNotFound(String),

    #[error("client '{0}' not found in your space")]
    ClientNotFound(String),

    #[error("client '{0}' did not respond")]
    ClientDidNotRespond(String),

    #[error("client is not waiting on that id")]
    ClientNotWaiting,
}

impl RelayError {
    /// The human-readable `info` string carried in an `EVENT_ERROR` payload.
    pub fn info(&self) -> String {
        self.to_string()
    }
}
