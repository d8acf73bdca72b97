//! Ledger identifiers
//!
//! A ledger id is a URL-safe base64 string. Hosts derive it from the
//! content of the creation request, so it is stable for the life of the log.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Stable identifier of one append-only ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerId(String);

impl LedgerId {
    /// Parse and validate an identifier.
    ///
    /// Only the URL-safe base64 alphabet is accepted, so an id can be used
    /// as a path segment without escaping.
    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdError::InvalidCharacters(s));
        }
        Ok(Self(s))
    }

    /// Derive an identifier from creation content (BLAKE3, base64url).
    pub fn from_content(content: &[u8]) -> Self {
        let hash = blake3::hash(content);
        Self(URL_SAFE_NO_PAD.encode(hash.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short_id(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LedgerId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LedgerId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<LedgerId> for String {
    fn from(id: LedgerId) -> Self {
        id.0
    }
}

impl AsRef<str> for LedgerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_is_stable() {
        let a = LedgerId::from_content(b"owner-key|proof");
        let b = LedgerId::from_content(b"owner-key|proof");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(LedgerId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn test_different_content_different_id() {
        assert_ne!(
            LedgerId::from_content(b"one"),
            LedgerId::from_content(b"two")
        );
    }

    #[test]
    fn test_rejects_path_characters() {
        assert_eq!(LedgerId::parse(""), Err(IdError::Empty));
        assert!(matches!(
            LedgerId::parse("abc/def"),
            Err(IdError::InvalidCharacters(_))
        ));
        assert!(LedgerId::parse("../etc").is_err());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = LedgerId::parse("abc-DEF_123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-DEF_123\"");
        let back: LedgerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<LedgerId>("\"a b\"").is_err());
    }
}
