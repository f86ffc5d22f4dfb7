//! Read access to the governance/voting layer.

use bastion_types::{Resolution, ResolutionType, ValidatorRecord};

use crate::{Pool, ReadTx, StoreError};

/// Schema holding validators, resolutions and votes. Its presence marks a
/// database as initialized by the node.
pub const VOTING_SCHEMA: &str = "bastion_voting";

/// Queries the voting tables through a caller-supplied pool or transaction.
pub trait VotingReader: Send + Sync {
    /// Validators currently recorded by the chain. Empty on a fresh store.
    fn validators(&self, db: &dyn Pool) -> Result<Vec<ValidatorRecord>, StoreError>;

    /// Pending resolutions of `kind`, with their voters.
    fn resolutions_by_type(
        &self,
        tx: &dyn ReadTx,
        kind: ResolutionType,
    ) -> Result<Vec<Resolution>, StoreError>;
}
