//! Cryptographic helpers for the bastion node.
//!
//! - **Ed25519** node keys (the node's own identity)
//! - **SHA-256** for node identity derivation and snapshot hashing
//! - Canonical peer identity: lowercase hex of the first 20 bytes of
//!   SHA-256(ed25519 public key)

pub mod error;
pub mod hash;
pub mod keys;
pub mod node_id;

pub use error::CryptoError;
pub use hash::{sha256, sha256_hex};
pub use keys::NodeKey;
pub use node_id::{pubkey_to_node_id, NODE_ID_BYTES};
