//! Raw public key bytes as they appear in genesis files and voting records.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A public key exactly as recorded by its source.
///
/// No validation happens here: genesis files and the voting store may carry
/// keys of any length. Whether the bytes form a usable key is decided when an
/// identity is derived from them (see `bastion_crypto::pubkey_to_node_id`).
/// Serialized as a lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::TypesError> {
        hex::decode(s.trim_start_matches("0x"))
            .map(Self)
            .map_err(|e| crate::TypesError::InvalidHex(format!("{s}: {e}")))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_through_json() {
        let key = PublicKey::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn accepts_0x_prefix() {
        let key = PublicKey::from_hex("0x0102").unwrap();
        assert_eq!(key.as_bytes(), &[1, 2]);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(PublicKey::from_hex("zz").is_err());
    }
}
