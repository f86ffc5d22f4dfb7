//! The node's own ed25519 key.

use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use std::path::Path;
use zeroize::Zeroize;

use crate::CryptoError;

/// Private identity key of this node.
///
/// Intentionally does not implement `Debug` or `Clone`; the inner signing key
/// zeroizes itself on drop.
pub struct NodeKey {
    signing_key: SigningKey,
}

impl NodeKey {
    /// Derive a key from a 32-byte seed (deterministic).
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Generate a fresh key from the operating system's entropy source.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        getrandom::getrandom(&mut seed).map_err(|e| CryptoError::Entropy(e.to_string()))?;
        let key = Self::from_seed(&seed);
        seed.zeroize();
        Ok(key)
    }

    /// Parse a hex-encoded key. Accepts the bare 32-byte seed or the 64-byte
    /// `seed || public key` form; in the latter case the embedded public key
    /// must match the seed.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(s.trim()).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let result = match bytes.len() {
            32 | 64 => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(&bytes[..32]);
                let key = Self::from_seed(&seed);
                seed.zeroize();
                if bytes.len() == 64 && bytes[32..] != key.public_key_bytes() {
                    Err(CryptoError::InvalidPrivateKey(
                        "embedded public key does not match seed".into(),
                    ))
                } else {
                    Ok(key)
                }
            }
            n => Err(CryptoError::InvalidPrivateKey(format!(
                "expected 32 or 64 bytes, got {n}"
            ))),
        };
        bytes.zeroize();
        result
    }

    /// Load a hex-encoded key file.
    pub fn from_file(path: &Path) -> Result<Self, CryptoError> {
        let mut content = std::fs::read_to_string(path)?;
        let key = Self::from_hex(&content);
        content.zeroize();
        key
    }

    /// Write the key as hex (`seed || public key`), creating the file.
    pub fn write_file(&self, path: &Path) -> Result<(), CryptoError> {
        let mut raw = self.signing_key.to_keypair_bytes();
        let mut encoded = hex::encode(raw);
        raw.zeroize();
        let result = std::fs::write(path, &encoded);
        encoded.zeroize();
        result.map_err(CryptoError::from)
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_deterministic() {
        let a = NodeKey::from_seed(&[3u8; 32]);
        let b = NodeKey::from_seed(&[3u8; 32]);
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn generated_keys_differ() {
        let a = NodeKey::generate().unwrap();
        let b = NodeKey::generate().unwrap();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private_key");
        let key = NodeKey::from_seed(&[5u8; 32]);
        key.write_file(&path).unwrap();
        let loaded = NodeKey::from_file(&path).unwrap();
        assert_eq!(loaded.public_key_bytes(), key.public_key_bytes());
    }

    #[test]
    fn hex_forms() {
        let key = NodeKey::from_seed(&[5u8; 32]);
        let seed_only = hex::encode([5u8; 32]);
        assert_eq!(
            NodeKey::from_hex(&seed_only).unwrap().public_key_bytes(),
            key.public_key_bytes()
        );

        let mut mismatched = [5u8; 32].to_vec();
        mismatched.extend_from_slice(&[0u8; 32]);
        assert!(NodeKey::from_hex(&hex::encode(mismatched)).is_err());
        assert!(NodeKey::from_hex("abcd").is_err());
    }
}
