//! The Log capability and its host-backed implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::{Signer, SigningKey};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use jlinx_core::LedgerId;

use crate::error::{LedgerError, Result};
use crate::header::LedgerHeader;
use crate::host::Host;

/// Append-only, owner-signed sequence of opaque records.
///
/// Records are immutable once appended and totally ordered. `length` never
/// decreases.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn id(&self) -> &LedgerId;

    fn header(&self) -> &LedgerHeader;

    /// True iff the local party holds the owner signing key
    fn writable(&self) -> bool;

    /// Latest known length
    fn length(&self) -> u64;

    /// Refresh to the latest length known by the host
    async fn update(&self) -> Result<u64>;

    /// All records up to the latest known length, in order
    async fn entries(&self) -> Result<Vec<Bytes>>;

    async fn get(&self, index: u64) -> Result<Bytes>;

    /// Sign and append records, returning the new length.
    ///
    /// With `expected_length`, the append is refused with
    /// [`LedgerError::LengthConflict`] when the ledger has moved past what
    /// the caller last observed.
    async fn append(&self, records: Vec<Bytes>, expected_length: Option<u64>) -> Result<u64>;

    /// Suspend until the ledger grows, then return the new length
    async fn wait_for_update(&self) -> Result<u64>;
}

/// A [`Ledger`] stored on a [`Host`], with a local record cache.
pub struct HostLedger {
    id: LedgerId,
    header: LedgerHeader,
    host: Arc<dyn Host>,
    signing_key: Option<SigningKey>,
    length: AtomicU64,
    /// Records fetched so far; always a prefix of the ledger
    cache: Mutex<Vec<Bytes>>,
}

impl HostLedger {
    /// Open a ledger, fetching its header from the host.
    ///
    /// When a signing key is given it must belong to the header's owner.
    #[instrument(skip_all, fields(ledger = %id.short_id()))]
    pub async fn open(
        host: Arc<dyn Host>,
        id: LedgerId,
        signing_key: Option<SigningKey>,
    ) -> Result<Self> {
        let header = host.header(&id).await?;

        if let Some(key) = &signing_key {
            if key.verifying_key().to_bytes() != header.owner_signing_key {
                return Err(LedgerError::header(format!(
                    "signing key does not match owner of ledger {}",
                    id
                )));
            }
        }

        debug!(length = header.length, writable = signing_key.is_some(), "Opened ledger");

        Ok(Self {
            length: AtomicU64::new(header.length),
            id,
            header,
            host,
            signing_key,
            cache: Mutex::new(Vec::new()),
        })
    }

}

#[async_trait]
impl Ledger for HostLedger {
    fn id(&self) -> &LedgerId {
        &self.id
    }

    fn header(&self) -> &LedgerHeader {
        &self.header
    }

    fn writable(&self) -> bool {
        self.signing_key.is_some()
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::SeqCst)
    }

    async fn update(&self) -> Result<u64> {
        let header = self.host.header(&self.id).await?;
        let previous = self.length.fetch_max(header.length, Ordering::SeqCst);
        Ok(previous.max(header.length))
    }

    async fn entries(&self) -> Result<Vec<Bytes>> {
        let length = self.length();
        let mut cache = self.cache.lock().await;
        while (cache.len() as u64) < length {
            let index = cache.len() as u64;
            let record = self.host.entry(&self.id, index).await?;
            cache.push(record);
        }
        Ok(cache[..length as usize].to_vec())
    }

    async fn get(&self, index: u64) -> Result<Bytes> {
        {
            let cache = self.cache.lock().await;
            if let Some(record) = cache.get(index as usize) {
                return Ok(record.clone());
            }
        }
        self.host.entry(&self.id, index).await
    }

    #[instrument(skip_all, fields(ledger = %self.id.short_id(), records = records.len()))]
    async fn append(&self, records: Vec<Bytes>, expected_length: Option<u64>) -> Result<u64> {
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| LedgerError::NotWritable(self.id.clone()))?;

        // Serializes local appends and keeps the cache a strict prefix
        let mut cache = self.cache.lock().await;

        if let Some(expected) = expected_length {
            let actual = self.update().await?;
            if actual != expected {
                return Err(LedgerError::LengthConflict { expected, actual });
            }
        }

        let mut length = self.length();
        for record in records {
            let signature = signing_key.sign(&record);
            let new_length = self.host.append(&self.id, record.clone(), &signature).await?;
            if new_length <= length {
                return Err(LedgerError::transport(
                    self.host.url(),
                    format!("append answered length {} after length {}", new_length, length),
                ));
            }
            if cache.len() as u64 == new_length - 1 {
                cache.push(record);
            }
            length = new_length;
            self.length.fetch_max(new_length, Ordering::SeqCst);
        }

        debug!(length, "Appended to ledger");
        Ok(length)
    }

    async fn wait_for_update(&self) -> Result<u64> {
        self.host.wait_for_update(&self.id, self.length()).await?;
        self.update().await
    }
}
