//! Local owner signing keys, keyed by ledger id.
//!
//! This is the in-process stand-in for the key vault: the client stores the
//! secret key of every ledger it creates here, and a ledger opened later is
//! writable exactly when its key is present.

use dashmap::DashMap;
use ed25519_dalek::SigningKey;

use jlinx_core::LedgerId;

/// Generate a fresh Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    let secret: [u8; 32] = rand::random();
    SigningKey::from_bytes(&secret)
}

#[derive(Default)]
pub struct Keyring {
    keys: DashMap<LedgerId, SigningKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: LedgerId, key: SigningKey) {
        self.keys.insert(id, key);
    }

    pub fn get(&self, id: &LedgerId) -> Option<SigningKey> {
        self.keys.get(id).map(|key| key.clone())
    }

    pub fn contains(&self, id: &LedgerId) -> bool {
        self.keys.contains_key(id)
    }

    pub fn ids(&self) -> Vec<LedgerId> {
        let mut ids: Vec<LedgerId> = self.keys.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for Keyring {
    // Never print secret material
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("ledgers", &self.keys.len())
            .finish()
    }
}
