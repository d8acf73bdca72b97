//! Error types for the jlinx client.
//!
//! Categories:
//! - schema/shape errors ([`ClientError::InvalidEventKind`], [`ClientError::PayloadValidation`])
//! - business-rule errors ([`ClientError::Rule`], [`ContractError`])
//! - protocol/identity errors ([`ClientError::Protocol`], [`ClientError::Did`])
//! - transport errors (inside [`ClientError::Ledger`])
//!
//! Unknown events met during replay are logged, never returned.

use jlinx_core::{DidError, IdError};
use jlinx_ledger::LedgerError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No compiled schema exists for this event kind.
    #[error("invalid event \"{0}\"")]
    InvalidEventKind(String),

    /// Payload does not match the event schema; lists every violation.
    #[error("invalid event payload: {0}")]
    PayloadValidation(String),

    /// A state-dependent business rule refused the event.
    #[error("{0}")]
    Rule(String),

    /// An event registry failed to compile.
    #[error("invalid EventMachine schema: {0}")]
    Schema(String),

    /// The document has no header record yet.
    #[error("document {0} has not been initialized")]
    NotInitialized(String),

    /// The document already has a header record.
    #[error("document {0} is already initialized")]
    AlreadyInitialized(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("DID error: {0}")]
    Did(#[from] DidError),

    #[error("Identifier error: {0}")]
    Id(#[from] IdError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<jlinx_host_client::HostError> for ClientError {
    fn from(e: jlinx_host_client::HostError) -> Self {
        ClientError::Ledger(e.into())
    }
}

/// Contract protocol rule violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("already offered")]
    AlreadyOffered,

    #[error("cannot acknowledge response, contract.state !== 'offered'")]
    CannotAcknowledge,

    #[error("contract {0} is not open for responses")]
    NotOffered(String),

    #[error("contract party {0} has already resolved")]
    AlreadyResolved(String),

    #[error("contract party {0} does not reference a contract")]
    NoContractId(String),

    #[error("contract response {0} does not exist")]
    UnknownResponse(String),

    #[error("contract {0} cannot answer itself")]
    OwnResponse(String),

    #[error("contract response {response} answers another contract: {contract}")]
    ForeignResponse { response: String, contract: String },
}
