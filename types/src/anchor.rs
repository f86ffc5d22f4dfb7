//! Light-client trust anchor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A verified `(height, hash)` pair that seeds header-chain verification
/// during state sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchor {
    /// Trusted height; [`TrustAnchor::UNRESOLVED_HEIGHT`] when no provider
    /// produced an anchor.
    pub height: i64,
    /// Header hash at `height`, as reported by the provider.
    pub hash: String,
    pub chain_id: String,
}

impl TrustAnchor {
    pub const UNRESOLVED_HEIGHT: i64 = -1;

    pub fn unresolved(chain_id: impl Into<String>) -> Self {
        Self {
            height: Self::UNRESOLVED_HEIGHT,
            hash: String::new(),
            chain_id: chain_id.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.height > 0
    }
}

impl fmt::Display for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.chain_id, self.height, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_anchor_uses_sentinel() {
        let a = TrustAnchor::unresolved("c");
        assert_eq!(a.height, -1);
        assert!(!a.is_resolved());
    }
}
