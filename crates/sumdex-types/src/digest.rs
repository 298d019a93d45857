use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length in bytes of a SHA-256 content digest.
pub const DIGEST_LEN: usize = 32;

/// Content digest of a file: the SHA-256 hash of its bytes.
///
/// Identical content always produces the same `Digest`, which makes it the
/// primary key for cross-catalog lookups. Serialized and persisted as
/// lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Create a `Digest` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; DIGEST_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex representation (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string. Upper-case input is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Parse a persisted digest column, where the empty string means
    /// "not computed yet".
    pub fn parse_optional(s: &str) -> Result<Option<Self>, TypeError> {
        if s.is_empty() {
            Ok(None)
        } else {
            Self::from_hex(s).map(Some)
        }
    }

    /// Returns `true` if the hex form of this digest starts with `prefix`
    /// (compared case-insensitively).
    pub fn has_hex_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

/// Hex column form of an optional digest (empty when absent).
pub fn optional_hex(digest: Option<&Digest>) -> String {
    digest.map(Digest::to_hex).unwrap_or_default()
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hi")
    const HI: &str = "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4";

    #[test]
    fn hex_roundtrip() {
        let d = Digest::from_hex(HI).unwrap();
        assert_eq!(d.to_hex(), HI);
        assert_eq!(format!("{d}"), HI);
    }

    #[test]
    fn uppercase_hex_is_accepted_and_normalized() {
        let d: Digest = HI.to_ascii_uppercase().parse().unwrap();
        assert_eq!(d.to_hex(), HI);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn non_hex_is_rejected() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn empty_column_is_absent() {
        assert_eq!(Digest::parse_optional("").unwrap(), None);
        assert!(Digest::parse_optional(HI).unwrap().is_some());
        assert_eq!(optional_hex(None), "");
    }

    #[test]
    fn prefix_match_ignores_case() {
        let d = Digest::from_hex(HI).unwrap();
        assert!(d.has_hex_prefix("8f43"));
        assert!(d.has_hex_prefix("8F43"));
        assert!(d.has_hex_prefix(""));
        assert!(!d.has_hex_prefix("8f44"));
    }

    #[test]
    fn short_hex_is_8_chars() {
        let d = Digest::from_hex(HI).unwrap();
        assert_eq!(d.short_hex(), "8f434346");
    }

    #[test]
    fn serde_uses_hex_string() {
        let d = Digest::from_hex(HI).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{HI}\""));
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, d);
    }
}
