//! Trust anchor discovery for state sync.
//!
//! Providers are tried strictly one at a time, in configured order. Each
//! attempt gets its own timeout. The first provider that returns a header
//! with a positive height on the genesis chain wins. No corroboration across
//! providers happens here; the anchor only seeds a header-chain sync that
//! verifies everything after it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use bastion_types::TrustAnchor;

use crate::NodeError;

pub const DEFAULT_TRUST_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum number of providers the state-sync subsystem accepts.
pub const MIN_STATE_SYNC_PROVIDERS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub height: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderInfo {
    pub chain_id: String,
    pub height: i64,
    pub hash: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Light-client view of one remote provider.
#[async_trait]
pub trait LightClient: Send + Sync {
    /// Height of the provider's latest locally trusted snapshot.
    async fn latest_snapshot_info(&self) -> Result<SnapshotInfo, ProviderError>;

    /// The signed header at `height`.
    async fn header_at(&self, height: i64) -> Result<HeaderInfo, ProviderError>;
}

/// Opens light-client connections to provider endpoints.
pub trait LightClientConnector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Box<dyn LightClient>, ProviderError>;
}

/// Why a single provider was skipped.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("non-positive height {0}")]
    NonPositiveHeight(i64),

    #[error("chain ID mismatch: expected {expected:?}, got {got:?}")]
    WrongChain { expected: String, got: String },
}

/// Resolves a [`TrustAnchor`] from an ordered list of providers.
pub struct TrustAnchorResolver<'a> {
    connector: &'a dyn LightClientConnector,
    chain_id: String,
    timeout: Duration,
}

impl<'a> TrustAnchorResolver<'a> {
    pub fn new(connector: &'a dyn LightClientConnector, chain_id: impl Into<String>) -> Self {
        Self {
            connector,
            chain_id: chain_id.into(),
            timeout: DEFAULT_TRUST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First provider yielding a valid anchor wins. Per-provider failures
    /// are logged and skipped; exhausting the list is
    /// [`NodeError::TrustUnavailable`].
    pub async fn resolve(&self, providers: &[String]) -> Result<TrustAnchor, NodeError> {
        if providers.is_empty() {
            return Err(NodeError::Config(
                "state sync is enabled but no providers are configured".into(),
            ));
        }

        for provider in providers {
            match self.attempt(provider).await {
                Ok(anchor) => {
                    tracing::info!(
                        provider = %provider,
                        height = anchor.height,
                        hash = %anchor.hash,
                        "trust anchor resolved"
                    );
                    return Ok(anchor);
                }
                Err(error) => {
                    tracing::warn!(provider = %provider, %error, "provider rejected for trust anchor");
                }
            }
        }

        Err(NodeError::TrustUnavailable(format!(
            "none of {} provider(s) returned a valid header for chain {:?}",
            providers.len(),
            self.chain_id
        )))
    }

    async fn attempt(&self, provider: &str) -> Result<TrustAnchor, AttemptError> {
        let client = self.connector.connect(provider)?;
        let header = tokio::time::timeout(self.timeout, async {
            let snapshot = client.latest_snapshot_info().await?;
            let height = i64::try_from(snapshot.height)
                .map_err(|_| ProviderError::Decode(format!("height {} overflows", snapshot.height)))?;
            if height <= 0 {
                return Err(AttemptError::NonPositiveHeight(height));
            }
            Ok::<_, AttemptError>(client.header_at(height).await?)
        })
        .await
        .map_err(|_| AttemptError::Timeout(self.timeout))??;

        if header.chain_id != self.chain_id {
            return Err(AttemptError::WrongChain {
                expected: self.chain_id.clone(),
                got: header.chain_id,
            });
        }
        if header.height <= 0 {
            return Err(AttemptError::NonPositiveHeight(header.height));
        }
        Ok(TrustAnchor {
            height: header.height,
            hash: header.hash,
            chain_id: header.chain_id,
        })
    }
}

/// Provider list handed to the state-sync subsystem. A single provider is
/// repeated to satisfy [`MIN_STATE_SYNC_PROVIDERS`].
pub fn effective_providers(providers: &[String]) -> Result<Vec<String>, NodeError> {
    match providers {
        [] => Err(NodeError::Config(
            "state sync is enabled but no providers are configured".into(),
        )),
        [only] => Ok(vec![only.clone(); MIN_STATE_SYNC_PROVIDERS]),
        many => Ok(many.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    enum Script {
        Fail,
        Hang,
        Header { chain_id: &'static str, height: i64 },
    }

    struct Scripted {
        script: Script,
    }

    #[async_trait]
    impl LightClient for Scripted {
        async fn latest_snapshot_info(&self) -> Result<SnapshotInfo, ProviderError> {
            match self.script {
                Script::Fail => Err(ProviderError::Request("connection refused".into())),
                Script::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Script::Header { height, .. } => Ok(SnapshotInfo {
                    height: height.max(0) as u64,
                }),
            }
        }

        async fn header_at(&self, height: i64) -> Result<HeaderInfo, ProviderError> {
            match self.script {
                Script::Header { chain_id, .. } => Ok(HeaderInfo {
                    chain_id: chain_id.to_string(),
                    height,
                    hash: format!("HASH{height}"),
                }),
                _ => Err(ProviderError::Request("unreachable".into())),
            }
        }
    }

    #[derive(Default)]
    struct Connector {
        scripts: HashMap<&'static str, Script>,
        attempted: Arc<Mutex<Vec<String>>>,
    }

    impl Connector {
        fn with(mut self, endpoint: &'static str, script: Script) -> Self {
            self.scripts.insert(endpoint, script);
            self
        }
    }

    impl LightClientConnector for Connector {
        fn connect(&self, endpoint: &str) -> Result<Box<dyn LightClient>, ProviderError> {
            self.attempted.lock().unwrap().push(endpoint.to_string());
            let script = self.scripts.get(endpoint).cloned().unwrap_or(Script::Fail);
            Ok(Box::new(Scripted { script }))
        }
    }

    fn providers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn first_valid_provider_wins() {
        let connector = Connector::default()
            .with("A", Script::Fail)
            .with("B", Script::Header { chain_id: "chain", height: 100 })
            .with("C", Script::Header { chain_id: "chain", height: 200 });
        let resolver = TrustAnchorResolver::new(&connector, "chain");

        let anchor = resolver.resolve(&providers(&["A", "B", "C"])).await.unwrap();
        assert_eq!(anchor.height, 100);
        assert_eq!(anchor.hash, "HASH100");
        assert_eq!(*connector.attempted.lock().unwrap(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn wrong_chain_and_zero_height_are_skipped() {
        let connector = Connector::default()
            .with("A", Script::Header { chain_id: "other", height: 50 })
            .with("B", Script::Header { chain_id: "chain", height: 0 })
            .with("C", Script::Header { chain_id: "chain", height: 7 });
        let resolver = TrustAnchorResolver::new(&connector, "chain");

        let anchor = resolver.resolve(&providers(&["A", "B", "C"])).await.unwrap();
        assert_eq!(anchor.height, 7);
        assert_eq!(anchor.chain_id, "chain");
    }

    #[tokio::test]
    async fn exhausted_providers_are_unavailable() {
        let connector = Connector::default();
        let resolver = TrustAnchorResolver::new(&connector, "chain");

        let err = resolver.resolve(&providers(&["A", "B"])).await.unwrap_err();
        assert!(matches!(err, NodeError::TrustUnavailable(_)));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn hung_provider_only_delays() {
        let connector = Connector::default()
            .with("A", Script::Hang)
            .with("B", Script::Header { chain_id: "chain", height: 9 });
        let resolver =
            TrustAnchorResolver::new(&connector, "chain").with_timeout(Duration::from_millis(50));

        let anchor = resolver.resolve(&providers(&["A", "B"])).await.unwrap();
        assert_eq!(anchor.height, 9);
    }

    #[test]
    fn single_provider_is_duplicated() {
        let effective = effective_providers(&providers(&["A"])).unwrap();
        assert_eq!(effective, providers(&["A", "A"]));
        assert_eq!(effective_providers(&providers(&["A", "B"])).unwrap().len(), 2);
        assert!(matches!(effective_providers(&[]), Err(NodeError::Config(_))));
    }
}
