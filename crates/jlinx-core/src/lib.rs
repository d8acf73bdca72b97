//! # jlinx-core
//!
//! Shared types for the jlinx client: ledger identifiers, the `did:key`
//! codec, multibase decoding, and their error types.

pub mod did;
pub mod error;
pub mod id;
pub mod multibase;

pub use did::{
    DID_PREFIX, DidDocument, KeyEntry, PublicKey, Service, did_to_public_key, public_key_to_did,
    signing_key_to_did_document,
};
pub use error::{DidError, IdError, MultibaseError};
pub use id::LedgerId;
