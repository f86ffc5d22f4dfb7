//! Statically configured peer entries (`identity@host:port`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A persistent-peer or seed entry from the node configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Node identity (derived address) of the peer.
    pub identity: String,
    /// `host:port` part, kept verbatim.
    pub address: String,
}

impl FromStr for PeerEntry {
    type Err = TypesError;

    /// Exactly one `@` is accepted; anything else is a configuration error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut parts = s.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(identity), Some(address), None) => Ok(Self {
                identity: identity.to_string(),
                address: address.to_string(),
            }),
            _ => Err(TypesError::InvalidPeerEntry {
                entry: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PeerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identity, self.address)
    }
}

/// Parse a comma separated peer list. An empty (or blank) list yields no
/// entries; every listed entry must be well-formed.
pub fn parse_peer_list(list: &str) -> Result<Vec<PeerEntry>, TypesError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',').map(str::parse).collect()
}
