//! Error types for jlinx-core

use thiserror::Error;

/// Errors raised while parsing or producing decentralized identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DidError {
    #[error("invalid did \"{0}\"")]
    InvalidSyntax(String),

    #[error("invalid key encoding format \"{0}\"")]
    InvalidKeyEncoding(String),

    #[error("did:{0} support not done yet")]
    UnsupportedMethod(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Errors raised while decoding multibase strings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MultibaseError {
    #[error("empty multibase string")]
    Empty,

    #[error("unsupported multibase prefix '{0}'")]
    UnsupportedPrefix(char),

    #[error("invalid multibase payload: {0}")]
    InvalidPayload(String),
}

/// Errors raised while parsing ledger identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("empty ledger id")]
    Empty,

    #[error("invalid ledger id \"{0}\"")]
    InvalidCharacters(String),
}
