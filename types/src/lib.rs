//! Fundamental types for the bastion node bootstrap.
//!
//! This crate defines the data shared by every other crate in the workspace:
//! the genesis descriptor, validator and resolution records, trust anchors,
//! peer entries and raw public keys.

pub mod anchor;
pub mod error;
pub mod genesis;
pub mod keys;
pub mod peer;
pub mod validator;

pub use anchor::TrustAnchor;
pub use error::TypesError;
pub use genesis::{ConsensusParams, GenesisDescriptor, GenesisValidator, MigrationParams, VoteParams};
pub use keys::PublicKey;
pub use peer::{parse_peer_list, PeerEntry};
pub use validator::{Resolution, ResolutionType, ValidatorRecord};
