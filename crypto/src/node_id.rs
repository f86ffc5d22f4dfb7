//! Canonical node identity derivation.
//!
//! A node identity is the lowercase hex encoding of the first
//! [`NODE_ID_BYTES`] bytes of SHA-256 over the raw ed25519 public key. It is
//! the form peers use in `identity@host:port` entries, so identities derived
//! here can be compared directly against configured peer strings.

use ed25519_dalek::{VerifyingKey, PUBLIC_KEY_LENGTH};

use crate::{sha256, CryptoError};

/// Number of digest bytes kept in a node identity.
pub const NODE_ID_BYTES: usize = 20;

/// Derive the node identity of a raw ed25519 public key.
///
/// Fails if the key is not exactly 32 bytes or does not decode to a curve
/// point. Callers must treat failure as fatal rather than skip the key.
pub fn pubkey_to_node_id(pub_key: &[u8]) -> Result<String, CryptoError> {
    let bytes: &[u8; PUBLIC_KEY_LENGTH] =
        pub_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_LENGTH,
                got: pub_key.len(),
            })?;
    VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;

    let digest = sha256(bytes);
    Ok(hex::encode(&digest[..NODE_ID_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKey;

    #[test]
    fn derive_is_deterministic() {
        let key = NodeKey::from_seed(&[7u8; 32]);
        let a = pubkey_to_node_id(&key.public_key_bytes()).unwrap();
        let b = pubkey_to_node_id(&key.public_key_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), NODE_ID_BYTES * 2);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn different_keys_different_ids() {
        let k1 = NodeKey::from_seed(&[1u8; 32]);
        let k2 = NodeKey::from_seed(&[2u8; 32]);
        assert_ne!(
            pubkey_to_node_id(&k1.public_key_bytes()).unwrap(),
            pubkey_to_node_id(&k2.public_key_bytes()).unwrap()
        );
    }

    #[test]
    fn wrong_length_rejected() {
        let err = pubkey_to_node_id(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 3
            }
        ));
    }

    #[test]
    fn id_is_truncated_digest() {
        let key = NodeKey::from_seed(&[9u8; 32]);
        let pk = key.public_key_bytes();
        let expected = hex::encode(&sha256(&pk)[..20]);
        assert_eq!(pubkey_to_node_id(&pk).unwrap(), expected);
    }
}
