//! Nullable restore tool and post-restore fixups.

use std::io::Read;
use std::sync::Mutex;

use bastion_store::{
    DbConfig, HashingReader, Pool, RestoreFixups, SnapshotRestorer, StoreError,
};

use crate::NullDb;

/// One call to [`NullRestorer::restore_from_stream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreCall {
    pub db_name: String,
    pub host: String,
    pub port: String,
    pub content: Vec<u8>,
    pub expected_hash: Vec<u8>,
}

/// Restorer that reads the stream into memory and verifies its hash.
///
/// On success the schemas given to [`NullRestorer::creating`] appear in the
/// attached [`NullDb`], as they would after replaying a real dump.
#[derive(Default)]
pub struct NullRestorer {
    calls: Mutex<Vec<RestoreCall>>,
    target: Option<(NullDb, Vec<String>)>,
    fail_with: Mutex<Option<String>>,
}

impl NullRestorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creating(db: NullDb, schemas: &[&str]) -> Self {
        Self {
            target: Some((db, schemas.iter().map(|s| s.to_string()).collect())),
            ..Self::default()
        }
    }

    /// Fail the next restores with a backend error.
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<RestoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SnapshotRestorer for NullRestorer {
    fn restore_from_stream(
        &self,
        reader: &mut dyn Read,
        db_name: &str,
        db: &DbConfig,
        expected_hash: &[u8],
    ) -> Result<(), StoreError> {
        let mut hashing = HashingReader::new(reader);
        let mut content = Vec::new();
        hashing.read_to_end(&mut content)?;

        self.calls.lock().unwrap().push(RestoreCall {
            db_name: db_name.to_string(),
            host: db.host.clone(),
            port: db.port.clone(),
            content,
            expected_hash: expected_hash.to_vec(),
        });

        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(StoreError::Restore(reason));
        }
        hashing.verify(expected_hash)?;

        if let Some((target, schemas)) = &self.target {
            for schema in schemas {
                target.add_schema(schema);
            }
        }
        Ok(())
    }
}

/// Records post-restore maintenance calls.
#[derive(Default)]
pub struct NullRestoreFixups {
    cleanups: Mutex<Vec<(bool, i64)>>,
    replica_identity_calls: Mutex<usize>,
}

impl NullRestoreFixups {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(adjust_expiration, start_height)` of every cleanup call.
    pub fn cleanups(&self) -> Vec<(bool, i64)> {
        self.cleanups.lock().unwrap().clone()
    }

    pub fn replica_identity_calls(&self) -> usize {
        *self.replica_identity_calls.lock().unwrap()
    }
}

impl RestoreFixups for NullRestoreFixups {
    fn cleanup_resolutions_after_migration(
        &self,
        db: &dyn Pool,
        adjust_expiration: bool,
        start_height: i64,
    ) -> Result<(), StoreError> {
        db.execute("-- cleanup resolutions")?;
        self.cleanups
            .lock()
            .unwrap()
            .push((adjust_expiration, start_height));
        Ok(())
    }

    fn ensure_full_replica_identity(&self, db: &dyn Pool) -> Result<(), StoreError> {
        db.execute("-- replica identity")?;
        *self.replica_identity_calls.lock().unwrap() += 1;
        Ok(())
    }
}
