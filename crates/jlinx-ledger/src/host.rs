//! Host transport seam
//!
//! A [`Host`] stores ledgers on behalf of their owners. It accepts an
//! append only when the record carries a valid signature by the ledger's
//! owner key. [`crate::MemoryHost`] implements it in-process; the HTTP
//! implementation lives in `jlinx-host-client`.

use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::{Signature, VerifyingKey};

use jlinx_core::LedgerId;

use crate::error::Result;
use crate::header::LedgerHeader;

#[async_trait]
pub trait Host: Send + Sync {
    /// Base URL of the host, recorded in documents that reference it.
    fn url(&self) -> &str;

    /// Fetch and validate the host's own public key.
    async fn public_key(&self) -> Result<VerifyingKey>;

    /// Create a ledger owned by `owner_signing_key`.
    ///
    /// `proof` is the owner's signature over the host public key bytes.
    async fn create(&self, owner_signing_key: &VerifyingKey, proof: &Signature)
    -> Result<LedgerId>;

    async fn header(&self, id: &LedgerId) -> Result<LedgerHeader>;

    /// Raw bytes of the record at `index` (0-based).
    async fn entry(&self, id: &LedgerId, index: u64) -> Result<Bytes>;

    /// Append one owner-signed record, returning the new length.
    async fn append(&self, id: &LedgerId, block: Bytes, signature: &Signature) -> Result<u64>;

    /// Suspend until the ledger grows beyond `length`.
    async fn wait_for_update(&self, id: &LedgerId, length: u64) -> Result<()>;
}
