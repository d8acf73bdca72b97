//! # jlinx-host-client
//!
//! [`RemoteHost`] speaks the jlinx host wire protocol: JSON over HTTP plus
//! raw binary records.
//!
//! | request | reply |
//! |---|---|
//! | `GET /` | `{ publicKey }` (multibase) |
//! | `POST /create` `{ ownerSigningKey, ownerSigningKeyProof }` (hex) | `{ id }` |
//! | `GET /{id}` | header JSON |
//! | `GET /{id}/{index}` | raw record bytes |
//! | `POST /{id}` raw bytes, `jlinx-signature: <hex>` | `{ length }` |
//! | `GET /{id}/{length-1}/next` | long-poll until the ledger grows |
//!
//! Every status >= 400 is a hard failure. Nothing is retried here.
//! TLS certificates are always verified.

pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ed25519_dalek::{Signature, VerifyingKey};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use jlinx_core::{LedgerId, multibase};
use jlinx_ledger::{Host, LedgerHeader};

pub use error::{HostError, Result};

/// Header carrying the owner signature of an appended record
pub const SIGNATURE_HEADER: &str = "jlinx-signature";

pub const DEFAULT_HOST_URL: &str = "https://testnet1.jlinx.test";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostInfo {
    public_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    owner_signing_key: String,
    owner_signing_key_proof: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: LedgerId,
}

#[derive(Deserialize)]
struct AppendResponse {
    length: u64,
}

/// HTTP implementation of [`Host`]
#[derive(Debug, Clone)]
pub struct RemoteHost {
    url: String,
    client: reqwest::Client,
    wait_timeout: Duration,
}

impl RemoteHost {
    /// Connect to `url` with a default client (30s timeout, verified TLS)
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Connect to `url` with a default client bounded by `timeout`
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Client(e.to_string()))?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self {
            url,
            client,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Upper bound for one long-poll request
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Build an endpoint URL below the host root
    pub fn endpoint(&self, parts: &[&str]) -> String {
        let mut url = self.url.clone();
        for part in parts {
            let part = part.trim_matches('/');
            if !part.is_empty() {
                url.push('/');
                url.push_str(part);
            }
        }
        url
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        debug!(url, "host request");
        let response = request.send().await.map_err(|e| HostError::RequestFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            warn!(url, status = status.as_u16(), "host request failed");
            return Err(HostError::RequestFailed {
                url: url.to_string(),
                message: format!("status {}", status),
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| HostError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

/// Decode a multibase host key, accepting only valid Ed25519 points
pub fn decode_public_key(encoded: &str) -> Option<VerifyingKey> {
    let bytes = multibase::decode(encoded).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

#[async_trait]
impl Host for RemoteHost {
    fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self), fields(host = %self.url))]
    async fn public_key(&self) -> jlinx_ledger::Result<VerifyingKey> {
        let url = self.endpoint(&[]);
        let response = self
            .send(&url, self.client.get(&url).header(ACCEPT, "application/json"))
            .await?;
        let info: HostInfo = Self::json(&url, response).await?;
        decode_public_key(&info.public_key)
            .ok_or_else(|| HostError::InvalidPublicKey(self.url.clone()).into())
    }

    #[instrument(skip_all, fields(host = %self.url))]
    async fn create(
        &self,
        owner_signing_key: &VerifyingKey,
        proof: &Signature,
    ) -> jlinx_ledger::Result<LedgerId> {
        let url = self.endpoint(&["create"]);
        let body = CreateRequest {
            owner_signing_key: hex::encode(owner_signing_key.as_bytes()),
            owner_signing_key_proof: hex::encode(proof.to_bytes()),
        };
        let response = self
            .send(
                &url,
                self.client
                    .post(&url)
                    .header(ACCEPT, "application/json")
                    .json(&body),
            )
            .await?;
        let created: CreateResponse = Self::json(&url, response).await?;
        debug!(id = %created.id, "created ledger");
        Ok(created.id)
    }

    async fn header(&self, id: &LedgerId) -> jlinx_ledger::Result<LedgerHeader> {
        let url = self.endpoint(&[id.as_str()]);
        let response = self
            .send(&url, self.client.get(&url).header(ACCEPT, "application/json"))
            .await?;
        Ok(Self::json(&url, response).await?)
    }

    async fn entry(&self, id: &LedgerId, index: u64) -> jlinx_ledger::Result<Bytes> {
        let url = self.endpoint(&[id.as_str(), &index.to_string()]);
        let response = self
            .send(
                &url,
                self.client
                    .get(&url)
                    .header(ACCEPT, "application/octet-stream"),
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HostError::InvalidResponse {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Ok(bytes)
    }

    #[instrument(skip(self, block, signature), fields(host = %self.url, id = %id.short_id(), size = block.len()))]
    async fn append(
        &self,
        id: &LedgerId,
        block: Bytes,
        signature: &Signature,
    ) -> jlinx_ledger::Result<u64> {
        let url = self.endpoint(&[id.as_str()]);
        let response = self
            .send(
                &url,
                self.client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(ACCEPT, "application/json")
                    .header(SIGNATURE_HEADER, hex::encode(signature.to_bytes()))
                    .body(block),
            )
            .await?;
        let appended: AppendResponse = Self::json(&url, response).await?;
        Ok(appended.length)
    }

    async fn wait_for_update(&self, id: &LedgerId, length: u64) -> jlinx_ledger::Result<()> {
        let index = length as i64 - 1;
        let url = self.endpoint(&[id.as_str(), &index.to_string(), "next"]);
        self.send(&url, self.client.get(&url).timeout(self.wait_timeout))
            .await?;
        Ok(())
    }
}
