//! Minimal multibase codec
//!
//! Covers the encodings jlinx hosts publish keys in: base58btc (`z`),
//! base16 (`f`/`F`), base64url (`u`) and base64 (`m`), all unpadded.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};

use crate::error::MultibaseError;

/// Decode a multibase string into raw bytes.
pub fn decode(input: &str) -> Result<Vec<u8>, MultibaseError> {
    let mut chars = input.chars();
    let prefix = chars.next().ok_or(MultibaseError::Empty)?;
    let payload = chars.as_str();

    let bytes = match prefix {
        'z' => bs58::decode(payload)
            .into_vec()
            .map_err(|e| MultibaseError::InvalidPayload(e.to_string()))?,
        'f' | 'F' => {
            hex::decode(payload).map_err(|e| MultibaseError::InvalidPayload(e.to_string()))?
        }
        'u' => URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| MultibaseError::InvalidPayload(e.to_string()))?,
        'm' => STANDARD_NO_PAD
            .decode(payload)
            .map_err(|e| MultibaseError::InvalidPayload(e.to_string()))?,
        other => return Err(MultibaseError::UnsupportedPrefix(other)),
    };
    Ok(bytes)
}

/// Encode bytes as base58btc multibase (`z` prefix).
pub fn encode_base58btc(bytes: &[u8]) -> String {
    format!("z{}", bs58::encode(bytes).into_string())
}
