//! Validator and governance resolution records read from the voting store.

use serde::{Deserialize, Serialize};

use crate::PublicKey;

/// A validator as recorded by the chain (or by a resolution's voter list).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub pub_key: PublicKey,
    pub power: i64,
}

impl ValidatorRecord {
    pub fn new(pub_key: PublicKey, power: i64) -> Self {
        Self { pub_key, power }
    }
}

/// Kinds of resolutions the whitelist builder cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionType {
    ValidatorJoin,
    ValidatorRemove,
}

impl ResolutionType {
    /// Name of the resolution type in the voting store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionType::ValidatorJoin => "validator_join",
            ResolutionType::ValidatorRemove => "validator_remove",
        }
    }
}

/// A pending resolution with the validators that already voted for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub resolution_type: ResolutionType,
    /// Height after which the resolution expires if not approved.
    pub expiration: i64,
    pub voters: Vec<ValidatorRecord>,
}
