//! Nullable voting store.

use std::sync::Mutex;

use bastion_store::{Pool, ReadTx, StoreError, VotingReader};
use bastion_types::{PublicKey, Resolution, ResolutionType, ValidatorRecord};

/// Validators and resolutions held in memory. The executor passed by the
/// caller is still used (one marker statement per call) so tests can check
/// which pool or transaction the query went through.
#[derive(Default)]
pub struct NullVoting {
    validators: Mutex<Vec<ValidatorRecord>>,
    resolutions: Mutex<Vec<Resolution>>,
}

impl NullVoting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator(&self, pub_key: PublicKey, power: i64) {
        self.validators
            .lock()
            .unwrap()
            .push(ValidatorRecord::new(pub_key, power));
    }

    pub fn add_resolution(&self, resolution: Resolution) {
        self.resolutions.lock().unwrap().push(resolution);
    }
}

impl VotingReader for NullVoting {
    fn validators(&self, db: &dyn Pool) -> Result<Vec<ValidatorRecord>, StoreError> {
        db.execute("-- validators")?;
        Ok(self.validators.lock().unwrap().clone())
    }

    fn resolutions_by_type(
        &self,
        tx: &dyn ReadTx,
        kind: ResolutionType,
    ) -> Result<Vec<Resolution>, StoreError> {
        tx.execute(&format!("-- resolutions {}", kind.as_str()))?;
        Ok(self
            .resolutions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resolution_type == kind)
            .cloned()
            .collect())
    }
}
