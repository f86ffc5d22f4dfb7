//! Genesis snapshot restore gate.
//!
//! A fresh node whose genesis pins an application hash can only reach that
//! state by replaying the matching snapshot. The decision ([`restore_required`])
//! is a pure predicate; the action ([`restore_snapshot`]) streams the
//! artifact into the store and relies on the restorer to verify its hash.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use bastion_store::{
    schema_exists, DbConfig, Pool, PoolOpener, RestoreFixups, SnapshotRestorer, VOTING_SCHEMA,
};
use bastion_types::GenesisDescriptor;

use crate::NodeError;

/// File suffixes that mark a gzip-compressed snapshot.
pub const COMPRESSED_SUFFIXES: &[&str] = &[".gz"];

/// Connections used for the one-off initialization probe.
const PROBE_POOL_CONNS: u32 = 3;

/// Whether the store must be seeded from the genesis snapshot.
///
/// True only when state sync is off, the genesis pins an application hash
/// and the store holds no node schema yet.
pub fn restore_required(
    state_sync_enabled: bool,
    genesis: &GenesisDescriptor,
    store_initialized: bool,
) -> bool {
    !state_sync_enabled && genesis.has_pinned_state() && !store_initialized
}

/// Probe whether `db_name` already contains the node's voting schema.
///
/// The probe pool is closed before returning, on success and on error.
pub fn is_store_initialized(opener: &dyn PoolOpener, db_name: &str) -> Result<bool, NodeError> {
    let pool = opener.open_pool(db_name, PROBE_POOL_CONNS)?;
    let probed = schema_exists(pool.as_ref(), VOTING_SCHEMA);
    let closed = pool.close();
    let initialized = probed?;
    closed?;
    Ok(initialized)
}

pub fn is_compressed(path: &Path) -> bool {
    let name = path.to_string_lossy();
    COMPRESSED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Open a snapshot artifact, transparently decompressing it when its name
/// carries a compressed suffix.
pub fn open_snapshot(path: &Path) -> Result<Box<dyn Read>, NodeError> {
    let file = File::open(path).map_err(|e| {
        NodeError::RestoreVerification(format!(
            "cannot open genesis snapshot {}: {e}",
            path.display()
        ))
    })?;
    let reader = BufReader::new(file);
    if is_compressed(path) {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Stream the snapshot at `path` into `db_name`. The restorer must reject
/// content whose hash differs from `expected_hash`.
pub fn restore_snapshot(
    restorer: &dyn SnapshotRestorer,
    path: &Path,
    db_name: &str,
    db: &DbConfig,
    expected_hash: &[u8],
) -> Result<(), NodeError> {
    let mut reader = open_snapshot(path)?;
    tracing::info!(
        snapshot = %path.display(),
        compressed = is_compressed(path),
        db_name,
        expected_hash = %hex::encode(expected_hash),
        "restoring genesis snapshot"
    );
    restorer
        .restore_from_stream(&mut reader, db_name, db, expected_hash)
        .map_err(|e| {
            NodeError::RestoreVerification(format!("restore of {}: {e}", path.display()))
        })?;
    tracing::info!(db_name, "genesis snapshot restored");
    Ok(())
}

/// Everything [`RestoreGate::maybe_restore`] needs, borrowed from the
/// orchestrator.
pub struct RestoreGate<'a> {
    pub state_sync_enabled: bool,
    pub genesis: &'a GenesisDescriptor,
    pub snapshot: Option<PathBuf>,
    pub db_name: &'a str,
    pub db: DbConfig,
    pub opener: &'a dyn PoolOpener,
    pub restorer: &'a dyn SnapshotRestorer,
}

impl RestoreGate<'_> {
    /// Restore the genesis snapshot if required. Returns whether a restore
    /// happened.
    ///
    /// The store is probed only when state sync is off and the genesis pins
    /// a hash; a missing snapshot is fatal once a restore is required.
    pub fn maybe_restore(&self) -> Result<bool, NodeError> {
        let Some(expected_hash) = self.genesis.data_app_hash.as_deref() else {
            return Ok(false);
        };
        if self.state_sync_enabled || expected_hash.is_empty() {
            return Ok(false);
        }

        let initialized = is_store_initialized(self.opener, self.db_name)?;
        if !restore_required(self.state_sync_enabled, self.genesis, initialized) {
            tracing::debug!(db_name = self.db_name, "store already initialized");
            return Ok(false);
        }

        let path = self.snapshot.as_deref().ok_or_else(|| {
            NodeError::RestoreVerification(
                "genesis pins an application hash but no genesis snapshot is configured".into(),
            )
        })?;
        if !path.exists() {
            return Err(NodeError::RestoreVerification(format!(
                "genesis snapshot {} not found",
                path.display()
            )));
        }

        restore_snapshot(self.restorer, path, self.db_name, &self.db, expected_hash)?;
        Ok(true)
    }
}

/// Post-restore maintenance of the freshly seeded store.
///
/// Pending resolutions carried by the snapshot have their expirations
/// rebased when migration support is on and a start height is configured.
pub fn apply_post_restore(
    fixups: &dyn RestoreFixups,
    db: &dyn Pool,
    migration_enabled: bool,
    genesis: &GenesisDescriptor,
) -> Result<(), NodeError> {
    let start_height = genesis.consensus_params.migration.start_height;
    if migration_enabled && start_height != 0 {
        tracing::info!(start_height, "adjusting resolution expirations after migration");
        fixups.cleanup_resolutions_after_migration(db, true, start_height)?;
    }
    fixups.ensure_full_replica_identity(db)?;
    Ok(())
}
