use std::fmt;

use thiserror::Error;

use crate::teardown::TeardownError;

#[derive(Debug, Error)]
pub enum NodeError {
    /// Operator-caused: malformed address, peer entry, key/cert layout.
    #[error("config error: {0}")]
    Config(String),

    /// No light-client provider yielded a usable trust anchor.
    #[error("trust anchor unavailable: {0}")]
    TrustUnavailable(String),

    /// Missing snapshot, decompression failure or hash mismatch.
    #[error("snapshot restore failed: {0}")]
    RestoreVerification(String),

    #[error(transparent)]
    Teardown(#[from] TeardownError),

    #[error("store error: {0}")]
    Store(#[from] bastion_store::StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] bastion_crypto::CryptoError),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("dependency check failed: {0}")]
    Dependency(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Whether a new bootstrap attempt could succeed without operator
    /// changes to the local node (e.g. with different providers).
    pub fn is_retriable(&self) -> bool {
        matches!(self, NodeError::TrustUnavailable(_))
    }
}

/// Bootstrap stage that failed, with its cause. Returned by
/// [`crate::bootstrap::Bootstrap::run`]; only the daemon turns it into a
/// process exit.
#[derive(Debug, Error)]
pub struct BootstrapFailure {
    pub stage: &'static str,
    #[source]
    pub source: NodeError,
}

impl BootstrapFailure {
    pub fn new(stage: &'static str, source: impl Into<NodeError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bootstrap failed at {}: {}", self.stage, self.source)
    }
}
