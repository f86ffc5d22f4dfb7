//! Network genesis descriptor.
//!
//! Loaded once at startup from `genesis.json` and shared read-only by every
//! bootstrap stage.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{PublicKey, TypesError};

/// A validator listed in the genesis file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub pub_key: PublicKey,
    pub power: i64,
    #[serde(default)]
    pub name: String,
}

/// Height window of a network migration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationParams {
    /// Height at which the migration starts on the old network (0 = none).
    #[serde(default)]
    pub start_height: i64,
    #[serde(default)]
    pub end_height: i64,
}

/// Voting thresholds for resolutions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteParams {
    /// Number of blocks a resolution stays open.
    #[serde(default = "default_vote_expiry")]
    pub vote_expiry: i64,
    #[serde(default = "default_max_votes_per_tx")]
    pub max_votes_per_tx: i64,
}

impl Default for VoteParams {
    fn default() -> Self {
        Self {
            vote_expiry: default_vote_expiry(),
            max_votes_per_tx: default_max_votes_per_tx(),
        }
    }
}

fn default_vote_expiry() -> i64 {
    14_400
}

fn default_max_votes_per_tx() -> i64 {
    200
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    #[serde(default)]
    pub migration: MigrationParams,
    #[serde(default)]
    pub votes: VoteParams,
}

/// The immutable genesis configuration of the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDescriptor {
    pub chain_id: String,

    #[serde(default = "default_initial_height")]
    pub initial_height: i64,

    /// Expected hash of the application state the network starts from.
    /// When present, a fresh node must be seeded from a matching snapshot.
    #[serde(default, with = "opt_hex", skip_serializing_if = "Option::is_none")]
    pub data_app_hash: Option<Vec<u8>>,

    #[serde(default)]
    pub validators: Vec<GenesisValidator>,

    #[serde(default)]
    pub consensus_params: ConsensusParams,
}

fn default_initial_height() -> i64 {
    1
}

impl GenesisDescriptor {
    /// Minimal descriptor with no validators and no pinned state.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            initial_height: default_initial_height(),
            data_app_hash: None,
            validators: Vec::new(),
            consensus_params: ConsensusParams::default(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, TypesError> {
        let genesis: Self =
            serde_json::from_str(s).map_err(|e| TypesError::InvalidGenesis(e.to_string()))?;
        if genesis.chain_id.is_empty() {
            return Err(TypesError::InvalidGenesis("empty chain_id".into()));
        }
        Ok(genesis)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, TypesError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Whether the genesis pins an application state hash. An empty hash
    /// counts as absent.
    pub fn has_pinned_state(&self) -> bool {
        self.data_app_hash.as_ref().is_some_and(|h| !h.is_empty())
    }
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_str(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => hex::decode(s.trim_start_matches("0x"))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
