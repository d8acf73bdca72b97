//! `did:key` identifiers and DID document rendering.
//!
//! The identifier is the fixed prefix `did:key:z6mk` followed by the base58
//! encoding of the raw 32-byte Ed25519 public key. The rendered document
//! shape (context URLs, section names, suite types) is part of the wire
//! contract with other jlinx implementations and must not drift.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DidError;

/// Prefix of every DID this client produces.
pub const DID_PREFIX: &str = "did:key:z6mk";

/// Marker that follows `did:key:` for base58 Ed25519 keys.
const KEY_ENCODING: &str = "z6mk";

/// JSON-LD contexts of a rendered DID document, in order.
pub const DID_CONTEXTS: [&str; 3] = [
    "https://www.w3.org/ns/did/v1",
    "https://w3id.org/security/suites/ed25519-2020/v1",
    "https://w3id.org/security/suites/x25519-2020/v1",
];

pub const ED25519_VERIFICATION_KEY: &str = "Ed25519VerificationKey2020";
pub const X25519_KEY_AGREEMENT_KEY: &str = "X25519KeyAgreementKey2020";

/// Raw Ed25519 public key bytes
pub type PublicKey = [u8; 32];

/// Encode a public signing key as a DID.
pub fn public_key_to_did(public_key: &PublicKey) -> String {
    format!("{}{}", DID_PREFIX, bs58::encode(public_key).into_string())
}

/// Decode a DID back into the public signing key it names.
pub fn did_to_public_key(did: &str) -> Result<PublicKey, DidError> {
    let (method, id) = did
        .strip_prefix("did:")
        .and_then(|rest| rest.split_once(':'))
        .filter(|(method, id)| !method.is_empty() && !id.is_empty())
        .ok_or_else(|| DidError::InvalidSyntax(did.to_string()))?;

    match method {
        "key" => {
            let encoded = id
                .strip_prefix(KEY_ENCODING)
                .ok_or_else(|| DidError::InvalidKeyEncoding(did.to_string()))?;
            let bytes = bs58::decode(encoded)
                .into_vec()
                .map_err(|_| DidError::InvalidKeyEncoding(did.to_string()))?;
            let actual = bytes.len();
            bytes
                .try_into()
                .map_err(|_| DidError::InvalidKeyLength {
                    expected: 32,
                    actual,
                })
        }
        other => Err(DidError::UnsupportedMethod(other.to_string())),
    }
}

/// One entry of a DID document's `services` section.
///
/// Unknown fields are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    pub fn new(
        id: impl Into<String>,
        service_type: impl Into<String>,
        service_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            service_endpoint: service_endpoint.into(),
            extra: Map::new(),
        }
    }
}

/// A key entry inside `verificationMethod` / `keyAgreement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub controller: String,
    pub public_key_multibase: String,
}

/// A rendered DID document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    pub verification_method: Vec<KeyEntry>,
    pub authentication: Vec<String>,
    pub assertion_method: Vec<String>,
    pub capability_delegation: Vec<String>,
    pub capability_invocation: Vec<String>,
    pub key_agreement: Vec<KeyEntry>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub services: Option<Vec<Service>>,
}

/// Render the DID document for a signing key.
///
/// Pure function of its inputs. Every verification relationship points at
/// the same key entry.
pub fn signing_key_to_did_document(
    public_key: &PublicKey,
    services: Option<&[Service]>,
) -> DidDocument {
    let did = public_key_to_did(public_key);
    let public_key_multibase = bs58::encode(public_key).into_string();
    let key_id = format!("{}#{}", did, public_key_multibase);

    let key_entry = |key_type: &str| KeyEntry {
        id: key_id.clone(),
        key_type: key_type.to_string(),
        controller: did.clone(),
        public_key_multibase: public_key_multibase.clone(),
    };

    DidDocument {
        context: DID_CONTEXTS.iter().map(|c| c.to_string()).collect(),
        verification_method: vec![key_entry(ED25519_VERIFICATION_KEY)],
        authentication: vec![key_id.clone()],
        assertion_method: vec![key_id.clone()],
        capability_delegation: vec![key_id.clone()],
        capability_invocation: vec![key_id.clone()],
        key_agreement: vec![key_entry(X25519_KEY_AGREEMENT_KEY)],
        services: services.map(|s| s.to_vec()),
        id: did,
    }
}
