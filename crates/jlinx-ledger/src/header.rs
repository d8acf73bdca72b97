//! Ledger header as served by a host (`GET /{id}`).

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use jlinx_core::PublicKey;

use crate::error::{LedgerError, Result};

/// Immutable ledger header.
///
/// `owner_signing_key` is hex on the wire. `length` is the host's view of
/// the ledger length at the time the header was fetched; it is the only
/// field that is not immutable and callers should use [`crate::Ledger::length`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHeader {
    #[serde(with = "hex_key", alias = "signingKey")]
    pub owner_signing_key: PublicKey,
    #[serde(default)]
    pub length: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LedgerHeader {
    pub fn new(owner_signing_key: PublicKey) -> Self {
        Self {
            owner_signing_key,
            length: 0,
            extra: Map::new(),
        }
    }

    /// The owner key as an Ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.owner_signing_key)
            .map_err(|e| LedgerError::header(format!("invalid owner signing key: {}", e)))
    }
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use jlinx_core::PublicKey;

    pub fn serialize<S: Serializer>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PublicKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let actual = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected 32 key bytes, got {}", actual)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wire_shape() {
        let header = LedgerHeader::new([0xab; 32]);
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["ownerSigningKey"], "ab".repeat(32));
        assert_eq!(json["length"], 0);
    }

    #[test]
    fn test_header_accepts_alias_and_extra_fields() {
        let json = serde_json::json!({
            "signingKey": "01".repeat(32),
            "length": 4,
            "host": "https://host.test"
        });
        let header: LedgerHeader = serde_json::from_value(json).unwrap();
        assert_eq!(header.owner_signing_key, [1u8; 32]);
        assert_eq!(header.length, 4);
        assert_eq!(header.extra["host"], "https://host.test");
    }

    #[test]
    fn test_header_rejects_short_key() {
        let json = serde_json::json!({ "ownerSigningKey": "0102" });
        assert!(serde_json::from_value::<LedgerHeader>(json).is_err());
    }
}
