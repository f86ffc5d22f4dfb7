//! Maintenance routines run on a store freshly restored from a snapshot.

use crate::{Pool, StoreError};

pub trait RestoreFixups: Send + Sync {
    /// Drop resolutions made obsolete by the migration and, when
    /// `adjust_expiration` is set, shift the expiration of the pending ones
    /// relative to `start_height`.
    fn cleanup_resolutions_after_migration(
        &self,
        db: &dyn Pool,
        adjust_expiration: bool,
        start_height: i64,
    ) -> Result<(), StoreError>;

    /// Enable full replica identity on every user dataset table.
    fn ensure_full_replica_identity(&self, db: &dyn Pool) -> Result<(), StoreError>;
}
