//! Restoring a plain SQL dump through `psql`.

use std::io::{Read, Seek, SeekFrom};

use bastion_store::{DbConfig, HashingReader, SnapshotRestorer, StoreError};

use crate::PsqlRunner;

/// Replays a SQL dump into a database with `psql`.
///
/// The stream is spooled to a temporary file while it is hashed, and only a
/// dump whose digest matches the expected hash is replayed. A mismatching
/// snapshot therefore never reaches the database.
#[derive(Clone, Debug, Default)]
pub struct PsqlRestorer {
    program: Option<String>,
}

impl PsqlRestorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }
}

impl SnapshotRestorer for PsqlRestorer {
    fn restore_from_stream(
        &self,
        reader: &mut dyn Read,
        db_name: &str,
        db: &DbConfig,
        expected_hash: &[u8],
    ) -> Result<(), StoreError> {
        let mut spool = tempfile::tempfile()?;
        let mut hashing = HashingReader::new(reader);
        std::io::copy(&mut hashing, &mut spool)
            .map_err(|e| StoreError::Restore(format!("failed to read snapshot stream: {e}")))?;
        let size = hashing.verify(expected_hash)?;
        tracing::info!(db = db_name, bytes = size, "snapshot hash verified, restoring");

        spool.seek(SeekFrom::Start(0))?;
        let mut runner = PsqlRunner::new(db.clone(), db_name);
        if let Some(program) = &self.program {
            runner = runner.with_program(program.clone());
        }
        runner.feed(&mut spool)?;

        tracing::info!(db = db_name, "database restored from snapshot");
        Ok(())
    }
}
