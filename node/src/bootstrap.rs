//! Bootstrap orchestration.
//!
//! Runs the trust stages in order against the injected storage and
//! light-client backends:
//!
//! 1. system tool check (skippable)
//! 2. genesis snapshot restore gate
//! 3. main store, plus post-restore fixups after a restore
//! 4. admission whitelist
//! 5. trust anchor, when state sync is enabled
//! 6. admin listener
//!
//! Every pool opened along the way registers a closer. If a stage fails,
//! the closers registered so far run before the failure is returned.

use std::sync::Arc;
use std::time::Duration;

use bastion_crypto::NodeKey;
use bastion_store::{Pool, PoolOpener, RestoreFixups, SnapshotRestorer, VotingReader};
use bastion_store_psql::{
    check_tool_version, PsqlOpener, PsqlRestorer, SqlRestoreFixups, SqlVotingReader,
};
use bastion_types::{GenesisDescriptor, TrustAnchor};

use crate::admin::{build_admin_listener, AdminListener, AdminTlsPolicy};
use crate::anchor::{effective_providers, LightClientConnector, TrustAnchorResolver};
use crate::config::NodeConfig;
use crate::light_client::HttpConnector;
use crate::restore::{apply_post_restore, RestoreGate};
use crate::teardown::TeardownRegistry;
use crate::whitelist::{build_whitelist, PeerWhitelist, WhitelistSources};
use crate::{BootstrapFailure, NodeError};

/// PostgreSQL major version every node must run, so dumps match.
pub const REQUIRED_PG_MAJOR: u32 = 16;

const MAIN_POOL_CONNS: u32 = 24;
const PEER_POOL_CONNS: u32 = 10;

/// External collaborators of the bootstrap.
#[derive(Clone)]
pub struct BootstrapDeps {
    pub opener: Arc<dyn PoolOpener>,
    pub restorer: Arc<dyn SnapshotRestorer>,
    pub fixups: Arc<dyn RestoreFixups>,
    pub voting: Arc<dyn VotingReader>,
    pub light_clients: Arc<dyn LightClientConnector>,
}

impl BootstrapDeps {
    /// PostgreSQL through the `psql` tool and HTTP light-client providers.
    pub fn postgres(config: &NodeConfig) -> Result<Self, NodeError> {
        let request_timeout = config.trust_timeout().max(Duration::from_secs(1));
        Ok(Self {
            opener: Arc::new(PsqlOpener::new(config.db_config())),
            restorer: Arc::new(PsqlRestorer::new()),
            fixups: Arc::new(SqlRestoreFixups),
            voting: Arc::new(SqlVotingReader),
            light_clients: Arc::new(HttpConnector::new(request_timeout)?),
        })
    }
}

/// What the rest of node construction receives.
pub struct BootstrapOutput {
    /// The genesis snapshot was restored during this start.
    pub restored: bool,
    pub main_db: Arc<dyn Pool>,
    /// Shared with the peer layer; [`PeerWhitelist::add_peer`] is its
    /// append hook for peers approved at runtime.
    pub whitelist: Arc<PeerWhitelist>,
    /// Set when state sync is enabled.
    pub trust_anchor: Option<TrustAnchor>,
    /// Provider list for the state-sync subsystem. Empty when state sync
    /// is disabled.
    pub state_sync_providers: Vec<String>,
    pub admin: AdminListener,
    /// Closers of every resource acquired above. The caller runs
    /// [`TeardownRegistry::teardown_all`] at shutdown.
    pub teardown: TeardownRegistry,
}

struct Stages {
    restored: bool,
    main_db: Arc<dyn Pool>,
    whitelist: Arc<PeerWhitelist>,
    trust_anchor: Option<TrustAnchor>,
    state_sync_providers: Vec<String>,
    admin: AdminListener,
}

pub struct Bootstrap<'a> {
    config: &'a NodeConfig,
    genesis: &'a GenesisDescriptor,
    node_key: &'a NodeKey,
    deps: BootstrapDeps,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        config: &'a NodeConfig,
        genesis: &'a GenesisDescriptor,
        node_key: &'a NodeKey,
        deps: BootstrapDeps,
    ) -> Self {
        Self {
            config,
            genesis,
            node_key,
            deps,
        }
    }

    pub async fn run(self) -> Result<BootstrapOutput, BootstrapFailure> {
        let mut teardown = TeardownRegistry::new();
        match self.run_stages(&mut teardown).await {
            Ok(stages) => Ok(BootstrapOutput {
                restored: stages.restored,
                main_db: stages.main_db,
                whitelist: stages.whitelist,
                trust_anchor: stages.trust_anchor,
                state_sync_providers: stages.state_sync_providers,
                admin: stages.admin,
                teardown,
            }),
            Err(failure) => {
                tracing::error!(stage = failure.stage, error = %failure.source, "bootstrap failed");
                if let Err(error) = teardown.teardown_all() {
                    tracing::warn!(%error, "teardown after failed bootstrap");
                }
                Err(failure)
            }
        }
    }

    async fn run_stages(
        &self,
        teardown: &mut TeardownRegistry,
    ) -> Result<Stages, BootstrapFailure> {
        let config = self.config;
        let state_sync = config.chain.state_sync.enable;

        if config.app.skip_dependency_check {
            tracing::warn!("skipping system tool version checks");
        } else {
            verify_dependencies(state_sync)
                .map_err(|e| BootstrapFailure::new("dependency check", e))?;
        }

        let restored = self
            .restore_genesis()
            .await
            .map_err(|e| BootstrapFailure::new("genesis restore", e))?;

        let main_db = self
            .open_pool(teardown, MAIN_POOL_CONNS, "closing main DB")
            .map_err(|e| BootstrapFailure::new("open main store", e))?;

        if restored {
            apply_post_restore(
                self.deps.fixups.as_ref(),
                main_db.as_ref(),
                config.migration.enable,
                self.genesis,
            )
            .map_err(|e| BootstrapFailure::new("post-restore fixups", e))?;
        }

        let whitelist = self
            .build_peer_whitelist(teardown)
            .map_err(|e| BootstrapFailure::new("peer whitelist", e))?;

        let (trust_anchor, state_sync_providers) = if state_sync {
            let (anchor, providers) = self
                .resolve_trust_anchor()
                .await
                .map_err(|e| BootstrapFailure::new("trust anchor", e))?;
            (Some(anchor), providers)
        } else {
            (None, Vec::new())
        };

        let admin = build_admin_listener(
            &config.app.admin_listen_address,
            &AdminTlsPolicy::from_config(config),
        )
        .map_err(|e| BootstrapFailure::new("admin listener", e))?;

        Ok(Stages {
            restored,
            main_db,
            whitelist,
            trust_anchor,
            state_sync_providers,
            admin,
        })
    }

    /// The store probe, snapshot spooling and `psql` replay all block, so
    /// the gate runs on the blocking pool.
    async fn restore_genesis(&self) -> Result<bool, NodeError> {
        let config = self.config;
        let state_sync_enabled = config.chain.state_sync.enable;
        let genesis = self.genesis.clone();
        let snapshot = config.snapshot_path();
        let db_name = config.app.db_name.clone();
        let db = config.db_config();
        let opener = Arc::clone(&self.deps.opener);
        let restorer = Arc::clone(&self.deps.restorer);

        tokio::task::spawn_blocking(move || {
            RestoreGate {
                state_sync_enabled,
                genesis: &genesis,
                snapshot,
                db_name: &db_name,
                db,
                opener: opener.as_ref(),
                restorer: restorer.as_ref(),
            }
            .maybe_restore()
        })
        .await
        .map_err(|e| NodeError::RestoreVerification(format!("restore task failed: {e}")))?
    }

    fn open_pool(
        &self,
        teardown: &mut TeardownRegistry,
        max_conns: u32,
        closer: &'static str,
    ) -> Result<Arc<dyn Pool>, NodeError> {
        let pool = self.deps.opener.open_pool(&self.config.app.db_name, max_conns)?;
        let closing = Arc::clone(&pool);
        teardown.register(closer, move || closing.close());
        Ok(pool)
    }

    fn build_peer_whitelist(
        &self,
        teardown: &mut TeardownRegistry,
    ) -> Result<Arc<PeerWhitelist>, NodeError> {
        let db = self.open_pool(teardown, PEER_POOL_CONNS, "closing peer store")?;
        let node_pub_key = self.node_key.public_key_bytes();
        let peers = build_whitelist(&WhitelistSources {
            p2p: &self.config.chain.p2p,
            genesis: self.genesis,
            node_pub_key: &node_pub_key,
            voting: self.deps.voting.as_ref(),
            db: db.as_ref(),
        })?;
        let whitelist = PeerWhitelist::new(self.config.chain.p2p.private_mode, peers);
        tracing::info!(
            peers = whitelist.len(),
            private_mode = whitelist.private_mode(),
            "peer whitelist ready"
        );
        Ok(Arc::new(whitelist))
    }

    async fn resolve_trust_anchor(&self) -> Result<(TrustAnchor, Vec<String>), NodeError> {
        let providers = self.config.state_sync_providers();
        let effective = effective_providers(&providers)?;
        let resolver =
            TrustAnchorResolver::new(self.deps.light_clients.as_ref(), &self.genesis.chain_id);
        let anchor = resolver
            .with_timeout(self.config.trust_timeout())
            .resolve(&providers)
            .await?;
        Ok((anchor, effective))
    }
}

/// `pg_dump` always, `psql` too when state sync restores snapshots.
pub fn verify_dependencies(state_sync: bool) -> Result<(), NodeError> {
    let tools: &[&str] = if state_sync {
        &["pg_dump", "psql"]
    } else {
        &["pg_dump"]
    };
    for tool in tools {
        let (major, minor) = check_tool_version(tool, REQUIRED_PG_MAJOR)
            .map_err(|e| NodeError::Dependency(e.to_string()))?;
        tracing::info!(tool, major, minor, "system tool version ok");
    }
    Ok(())
}
