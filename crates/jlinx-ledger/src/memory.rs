//! In-memory host implementation
//!
//! Implements the full [`Host`] contract, including owner-signature checks
//! and long-poll updates, without any network. Suitable for tests and for
//! running several clients against one shared host inside a process.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use tokio::sync::watch;
use tracing::{debug, trace};

use jlinx_core::LedgerId;

use crate::error::{LedgerError, Result};
use crate::header::LedgerHeader;
use crate::host::Host;
use crate::keyring::generate_signing_key;

struct MemoryLog {
    owner: VerifyingKey,
    records: Vec<Bytes>,
    length_tx: watch::Sender<u64>,
}

/// In-memory [`Host`]
pub struct MemoryHost {
    url: String,
    signing_key: SigningKey,
    ledgers: DashMap<LedgerId, MemoryLog>,
}

impl MemoryHost {
    /// Create a host with a freshly generated identity key
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_signing_key(url, generate_signing_key())
    }

    pub fn with_signing_key(url: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            url: url.into(),
            signing_key,
            ledgers: DashMap::new(),
        }
    }

    /// Number of ledgers held by this host
    pub fn ledger_count(&self) -> usize {
        self.ledgers.len()
    }

    /// Current length of a ledger, if it exists
    pub fn ledger_length(&self, id: &LedgerId) -> Option<u64> {
        self.ledgers.get(id).map(|log| log.records.len() as u64)
    }
}

#[async_trait]
impl Host for MemoryHost {
    fn url(&self) -> &str {
        &self.url
    }

    async fn public_key(&self) -> Result<VerifyingKey> {
        Ok(self.signing_key.verifying_key())
    }

    async fn create(
        &self,
        owner_signing_key: &VerifyingKey,
        proof: &Signature,
    ) -> Result<LedgerId> {
        let host_key = self.signing_key.verifying_key();
        owner_signing_key
            .verify(host_key.as_bytes(), proof)
            .map_err(|_| LedgerError::InvalidSignature("ownership proof".into()))?;

        let mut content = owner_signing_key.as_bytes().to_vec();
        content.extend_from_slice(&proof.to_bytes());
        let id = LedgerId::from_content(&content);

        self.ledgers.entry(id.clone()).or_insert_with(|| MemoryLog {
            owner: *owner_signing_key,
            records: Vec::new(),
            length_tx: watch::Sender::new(0),
        });

        debug!(ledger = %id.short_id(), "Created ledger");
        Ok(id)
    }

    async fn header(&self, id: &LedgerId) -> Result<LedgerHeader> {
        let log = self
            .ledgers
            .get(id)
            .ok_or_else(|| LedgerError::not_found(format!("ledger {}", id)))?;
        let mut header = LedgerHeader::new(log.owner.to_bytes());
        header.length = log.records.len() as u64;
        Ok(header)
    }

    async fn entry(&self, id: &LedgerId, index: u64) -> Result<Bytes> {
        let log = self
            .ledgers
            .get(id)
            .ok_or_else(|| LedgerError::not_found(format!("ledger {}", id)))?;
        log.records
            .get(index as usize)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("record {}/{}", id, index)))
    }

    async fn append(&self, id: &LedgerId, block: Bytes, signature: &Signature) -> Result<u64> {
        let mut log = self
            .ledgers
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found(format!("ledger {}", id)))?;

        log.owner
            .verify(&block, signature)
            .map_err(|_| LedgerError::InvalidSignature(id.to_string()))?;

        log.records.push(block);
        let length = log.records.len() as u64;
        log.length_tx.send_replace(length);

        trace!(ledger = %id.short_id(), length, "Appended record");
        Ok(length)
    }

    async fn wait_for_update(&self, id: &LedgerId, length: u64) -> Result<()> {
        let mut rx = {
            let log = self
                .ledgers
                .get(id)
                .ok_or_else(|| LedgerError::not_found(format!("ledger {}", id)))?;
            log.length_tx.subscribe()
        };

        rx.wait_for(|current| *current > length)
            .await
            .map_err(|_| LedgerError::not_found(format!("ledger {} closed", id)))?;
        Ok(())
    }
}
