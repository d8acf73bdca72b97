//! Error types for jlinx-ledger

use thiserror::Error;

use jlinx_core::{IdError, LedgerId};

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur reading from or appending to a ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The local party does not hold the owner signing key
    #[error("ledger {0} is not writable")]
    NotWritable(LedgerId),

    /// Ledger or record does not exist on the host
    #[error("Not found: {0}")]
    NotFound(String),

    /// An append or creation proof carried a bad signature
    #[error("invalid signature for ledger {0}")]
    InvalidSignature(String),

    /// The ledger grew between the caller's read and its append
    #[error("ledger length changed: expected {expected}, found {actual}")]
    LengthConflict { expected: u64, actual: u64 },

    /// Header missing, malformed, or inconsistent with local keys
    #[error("Header error: {0}")]
    Header(String),

    /// Any non-success response or unparseable reply from the host
    #[error("request failed url=\"{url}\": {message}")]
    Transport { url: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Identifier error: {0}")]
    Id(#[from] IdError),
}

impl LedgerError {
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    pub fn header(message: impl Into<String>) -> Self {
        Self::Header(message.into())
    }

    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
