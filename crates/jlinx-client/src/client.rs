//! Document factory.
//!
//! [`JlinxClient`] owns the connection to one host and the keyring of the
//! ledgers created through it. Every typed document is opened through it.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signer, VerifyingKey};
use tracing::{debug, info, instrument};

use jlinx_core::LedgerId;
use jlinx_host_client::RemoteHost;
use jlinx_ledger::{Host, HostLedger, Keyring, Ledger, generate_signing_key};

use crate::config::ClientConfig;
use crate::contract::Contracts;
use crate::error::Result;
use crate::identifier::Identifiers;
use crate::machine::LedgerResolver;
use crate::profile::Profiles;

struct ClientInner {
    host: Arc<dyn Host>,
    host_key: VerifyingKey,
    keyring: Arc<Keyring>,
}

/// Handle to a host plus the local keyring. Cheap to clone.
#[derive(Clone)]
pub struct JlinxClient {
    inner: Arc<ClientInner>,
}

impl JlinxClient {
    /// Connect to a host, fetching and validating its public key.
    #[instrument(skip_all, fields(host = %host.url()))]
    pub async fn connect(host: Arc<dyn Host>, keyring: Arc<Keyring>) -> Result<Self> {
        let host_key = host.public_key().await?;
        info!(ledgers = keyring.len(), "Connected to host");
        Ok(Self {
            inner: Arc::new(ClientInner {
                host,
                host_key,
                keyring,
            }),
        })
    }

    /// Connect to the remote host named by `config`.
    pub async fn from_config(config: &ClientConfig, keyring: Arc<Keyring>) -> Result<Self> {
        let mut host = RemoteHost::with_timeout(config.host_url.as_str(), config.request_timeout)?;
        if let Some(wait_timeout) = config.wait_timeout {
            host = host.with_wait_timeout(wait_timeout);
        }
        Self::connect(Arc::new(host), keyring).await
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    pub fn host_url(&self) -> &str {
        self.inner.host.url()
    }

    pub fn host_public_key(&self) -> &VerifyingKey {
        &self.inner.host_key
    }

    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.inner.keyring
    }

    /// Create an empty ledger owned by a fresh signing key.
    ///
    /// The key proves itself to the host by signing the host public key and
    /// is kept in the keyring, so the ledger stays writable when reopened.
    #[instrument(skip_all)]
    pub async fn create_ledger(&self) -> Result<Arc<dyn Ledger>> {
        let owner = generate_signing_key();
        let proof = owner.sign(self.inner.host_key.as_bytes());
        let id = self.inner.host.create(&owner.verifying_key(), &proof).await?;

        self.inner.keyring.insert(id.clone(), owner.clone());
        debug!(ledger = %id.short_id(), "Created ledger");

        let ledger = HostLedger::open(self.inner.host.clone(), id, Some(owner)).await?;
        Ok(Arc::new(ledger))
    }

    /// Open a ledger, writable iff the keyring holds its owner key.
    pub async fn open_ledger(&self, id: &LedgerId) -> Result<Arc<dyn Ledger>> {
        let key = self.inner.keyring.get(id);
        let ledger = HostLedger::open(self.inner.host.clone(), id.clone(), key).await?;
        Ok(Arc::new(ledger))
    }

    /// Every ledger created through this keyring, in id order.
    pub async fn all(&self) -> Result<Vec<Arc<dyn Ledger>>> {
        let mut ledgers = Vec::new();
        for id in self.inner.keyring.ids() {
            ledgers.push(self.open_ledger(&id).await?);
        }
        Ok(ledgers)
    }

    pub fn resolver(&self) -> Arc<dyn LedgerResolver> {
        Arc::new(self.clone())
    }

    pub fn identifiers(&self) -> Identifiers {
        Identifiers::new(self.clone())
    }

    pub fn profiles(&self) -> Profiles {
        Profiles::new(self.clone())
    }

    pub fn contracts(&self) -> Contracts {
        Contracts::new(self.clone())
    }
}

#[async_trait]
impl LedgerResolver for JlinxClient {
    async fn open_ledger(&self, id: &LedgerId) -> Result<Arc<dyn Ledger>> {
        JlinxClient::open_ledger(self, id).await
    }
}

impl std::fmt::Debug for JlinxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JlinxClient")
            .field("host", &self.host_url())
            .field("keyring", &self.inner.keyring)
            .finish()
    }
}
