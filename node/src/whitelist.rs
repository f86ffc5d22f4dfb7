//! Admission whitelist: which peer identities may connect.
//!
//! Sources are merged in a fixed order:
//! 1. explicitly configured identities,
//! 2. validators recorded in the store, or the genesis validators when the
//!    store has none,
//! 3. this node's own identity,
//! 4. join candidates this node has already voted for,
//! 5. the identity part of every persistent peer and seed.
//!
//! Public keys become identities through [`pubkey_to_node_id`]; a key that
//! cannot be converted fails the whole build.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use bastion_crypto::pubkey_to_node_id;
use bastion_store::{Pool, VotingReader};
use bastion_types::{parse_peer_list, GenesisDescriptor, ResolutionType, ValidatorRecord};

use crate::config::P2PConfig;
use crate::NodeError;

/// Inputs of [`build_whitelist`].
pub struct WhitelistSources<'a> {
    pub p2p: &'a P2PConfig,
    pub genesis: &'a GenesisDescriptor,
    pub node_pub_key: &'a [u8],
    pub voting: &'a dyn VotingReader,
    pub db: &'a dyn Pool,
}

/// Compute the admission whitelist in source order. Duplicates are kept;
/// they are harmless to [`PeerWhitelist`].
pub fn build_whitelist(sources: &WhitelistSources<'_>) -> Result<Vec<String>, NodeError> {
    let mut peers: Vec<String> = sources
        .p2p
        .whitelist_peers
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let recorded = sources.voting.validators(sources.db)?;
    if recorded.is_empty() {
        for validator in &sources.genesis.validators {
            peers.push(derive_identity(validator.pub_key.as_bytes(), "genesis validator")?);
        }
    } else {
        for validator in &recorded {
            peers.push(derive_identity(validator.pub_key.as_bytes(), "validator")?);
        }
    }

    peers.push(derive_identity(sources.node_pub_key, "node key")?);

    for voter in approved_by_node(sources.voting, sources.db, sources.node_pub_key)? {
        peers.push(derive_identity(voter.pub_key.as_bytes(), "approved join")?);
    }

    for (kind, list) in [
        ("persistent peer", &sources.p2p.persistent_peers),
        ("seed", &sources.p2p.seeds),
    ] {
        let entries = parse_peer_list(list)
            .map_err(|e| NodeError::Config(format!("invalid {kind} list: {e}")))?;
        peers.extend(entries.into_iter().map(|entry| entry.identity));
    }

    tracing::debug!(count = peers.len(), "admission whitelist built");
    Ok(peers)
}

/// Voter records of pending validator-join resolutions this node voted for.
fn approved_by_node(
    voting: &dyn VotingReader,
    db: &dyn Pool,
    node_pub_key: &[u8],
) -> Result<Vec<ValidatorRecord>, NodeError> {
    let tx = db.begin_read_tx()?;
    let resolutions = voting.resolutions_by_type(tx.as_ref(), ResolutionType::ValidatorJoin);
    let rolled_back = tx.rollback();
    let resolutions = resolutions?;
    rolled_back?;

    Ok(resolutions
        .into_iter()
        .flat_map(|r| r.voters)
        .filter(|voter| voter.pub_key.as_bytes() == node_pub_key)
        .collect())
}

fn derive_identity(pub_key: &[u8], source: &str) -> Result<String, NodeError> {
    pubkey_to_node_id(pub_key).map_err(|e| {
        NodeError::Config(format!(
            "cannot derive identity of {source} {}: {e}",
            hex::encode(pub_key)
        ))
    })
}

/// Runtime peer whitelist shared with the peer layer.
///
/// In private mode only listed identities are allowed. Otherwise every peer
/// is allowed and the set is still maintained for when private mode is
/// turned on by a restart.
#[derive(Debug)]
pub struct PeerWhitelist {
    private_mode: bool,
    peers: RwLock<BTreeSet<String>>,
}

impl PeerWhitelist {
    pub fn new(private_mode: bool, peers: impl IntoIterator<Item = String>) -> Self {
        Self {
            private_mode,
            peers: RwLock::new(peers.into_iter().collect()),
        }
    }

    pub fn private_mode(&self) -> bool {
        self.private_mode
    }

    pub fn is_allowed(&self, identity: &str) -> bool {
        !self.private_mode || self.contains(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    /// Append hook for peers approved while the node runs. Returns whether
    /// the identity was new.
    pub fn add_peer(&self, identity: impl Into<String>) -> bool {
        let identity = identity.into();
        tracing::debug!(peer = %identity, "peer added to whitelist");
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity)
    }

    pub fn remove_peer(&self, identity: &str) -> bool {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }

    /// Sorted snapshot of the whitelisted identities.
    pub fn list(&self) -> Vec<String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_crypto::NodeKey;
    use bastion_nullables::{NullDb, NullVoting};
    use bastion_store::PoolOpener;
    use bastion_types::{GenesisValidator, PublicKey, Resolution};
    use std::sync::Arc;

    fn key(seed: u8) -> Vec<u8> {
        NodeKey::from_seed(&[seed; 32]).public_key_bytes().to_vec()
    }

    fn id(seed: u8) -> String {
        pubkey_to_node_id(&key(seed)).unwrap()
    }

    fn genesis_with(seeds: &[u8]) -> GenesisDescriptor {
        let mut genesis = GenesisDescriptor::new("test-chain");
        genesis.validators = seeds
            .iter()
            .map(|s| GenesisValidator {
                pub_key: PublicKey::new(key(*s)),
                power: 1,
                name: format!("val{s}"),
            })
            .collect();
        genesis
    }

    fn pool() -> Arc<dyn Pool> {
        NullDb::new().open_pool("bastion", 10).unwrap()
    }

    fn build(
        p2p: &P2PConfig,
        genesis: &GenesisDescriptor,
        voting: &NullVoting,
    ) -> Result<Vec<String>, NodeError> {
        let db = pool();
        let own = key(99);
        build_whitelist(&WhitelistSources {
            p2p,
            genesis,
            node_pub_key: &own,
            voting,
            db: db.as_ref(),
        })
    }

    fn as_set(peers: Vec<String>) -> BTreeSet<String> {
        peers.into_iter().collect()
    }

    #[test]
    fn genesis_validators_used_when_store_is_empty() {
        let peers = build(&P2PConfig::default(), &genesis_with(&[1, 2]), &NullVoting::new()).unwrap();
        assert_eq!(as_set(peers), as_set(vec![id(1), id(2), id(99)]));
    }

    #[test]
    fn store_validators_override_genesis() {
        let voting = NullVoting::new();
        voting.add_validator(PublicKey::new(key(3)), 10);
        let peers = build(&P2PConfig::default(), &genesis_with(&[1, 2]), &voting).unwrap();
        assert_eq!(as_set(peers), as_set(vec![id(3), id(99)]));
    }

    #[test]
    fn own_identity_comes_after_validators() {
        let peers = build(&P2PConfig::default(), &genesis_with(&[1]), &NullVoting::new()).unwrap();
        assert_eq!(peers, vec![id(1), id(99)]);
    }

    #[test]
    fn approved_joins_include_only_own_votes() {
        let voting = NullVoting::new();
        voting.add_resolution(Resolution {
            resolution_type: ResolutionType::ValidatorJoin,
            expiration: 100,
            voters: vec![
                ValidatorRecord::new(PublicKey::new(key(99)), 1),
                ValidatorRecord::new(PublicKey::new(key(4)), 1),
            ],
        });
        voting.add_resolution(Resolution {
            resolution_type: ResolutionType::ValidatorJoin,
            expiration: 100,
            voters: vec![ValidatorRecord::new(PublicKey::new(key(5)), 1)],
        });
        let peers = build(&P2PConfig::default(), &genesis_with(&[]), &voting).unwrap();
        assert_eq!(peers, vec![id(99), id(99)]);
    }

    #[test]
    fn configured_entries_and_peer_identities_are_merged() {
        let p2p = P2PConfig {
            whitelist_peers: "alpha, beta".into(),
            persistent_peers: "nodeid@1.2.3.4:26656".into(),
            seeds: "seedid@5.6.7.8:26656".into(),
            private_mode: true,
        };
        let peers = build(&p2p, &genesis_with(&[]), &NullVoting::new()).unwrap();
        assert_eq!(peers, vec!["alpha".to_string(), "beta".into(), id(99), "nodeid".into(), "seedid".into()]);
    }

    #[test]
    fn malformed_peer_entry_is_fatal() {
        let p2p = P2PConfig {
            seeds: "badentry".into(),
            ..Default::default()
        };
        let err = build(&p2p, &genesis_with(&[]), &NullVoting::new()).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn underivable_key_is_fatal() {
        let mut genesis = genesis_with(&[1]);
        genesis.validators[0].pub_key = PublicKey::new(vec![1, 2, 3]);
        let err = build(&P2PConfig::default(), &genesis, &NullVoting::new()).unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn private_mode_restricts_to_listed_peers() {
        let whitelist = PeerWhitelist::new(true, vec!["a".to_string(), "a".into()]);
        assert_eq!(whitelist.len(), 1);
        assert!(whitelist.is_allowed("a"));
        assert!(!whitelist.is_allowed("b"));

        assert!(whitelist.add_peer("b"));
        assert!(!whitelist.add_peer("b"));
        assert!(whitelist.is_allowed("b"));

        assert!(whitelist.remove_peer("a"));
        assert_eq!(whitelist.list(), vec!["b".to_string()]);
    }

    #[test]
    fn open_mode_allows_everyone() {
        let whitelist = PeerWhitelist::new(false, Vec::new());
        assert!(whitelist.is_allowed("anyone"));
        assert!(whitelist.is_empty());
    }
}
