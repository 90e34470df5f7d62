//! REST client error types

use thiserror::Error;

use crate::types::AccountAddress;

/// REST client error type
#[derive(Debug, Error)]
pub enum RestError {
    /// Transport/network error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the node or faucet
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error message from the response body
        message: String,
        /// Machine-readable error code, when the API provides one
        error_code: Option<String>,
    },

    /// The address has never been created or funded on chain
    #[error("Account not found: {0}")]
    AccountNotFound(AccountAddress),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A transaction was committed but did not succeed
    #[error("Transaction {hash} failed: {vm_status}")]
    TransactionFailed {
        /// Transaction hash
        hash: String,
        /// VM status reported by the node
        vm_status: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RestError {
    /// Whether the node answered 404 for the requested item
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RestError::AccountNotFound(_) | RestError::Http { status: 404, .. }
        )
    }
}

impl From<serde_json::Error> for RestError {
    fn from(e: serde_json::Error) -> Self {
        RestError::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for RestError {
    fn from(e: hex::FromHexError) -> Self {
        RestError::InvalidAddress(e.to_string())
    }
}
