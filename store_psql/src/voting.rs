//! SQL access to the voting schema.

use std::collections::BTreeMap;

use bastion_store::{Pool, ReadTx, RestoreFixups, StoreError, VotingReader, VOTING_SCHEMA};
use bastion_types::{PublicKey, Resolution, ResolutionType, ValidatorRecord};

/// Resolution type written by network migrations.
const MIGRATION_RESOLUTION_TYPE: &str = "migration";

/// Prefix of the schemas that hold user datasets.
const DATASET_SCHEMA_PREFIX: &str = "ds_";

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlVotingReader;

impl VotingReader for SqlVotingReader {
    fn validators(&self, db: &dyn Pool) -> Result<Vec<ValidatorRecord>, StoreError> {
        let res = db.execute(&format!(
            "SELECT encode(pub_key, 'hex'), power FROM {VOTING_SCHEMA}.voters \
             WHERE power > 0 ORDER BY pub_key"
        ))?;
        res.rows.iter().map(|row| parse_voter(row, 0)).collect()
    }

    fn resolutions_by_type(
        &self,
        tx: &dyn ReadTx,
        kind: ResolutionType,
    ) -> Result<Vec<Resolution>, StoreError> {
        let res = tx.execute(&format!(
            "SELECT encode(r.id, 'hex'), r.expiration, encode(v.pub_key, 'hex'), v.power \
             FROM {VOTING_SCHEMA}.resolutions r \
             JOIN {VOTING_SCHEMA}.resolution_types t ON r.type = t.id \
             LEFT JOIN {VOTING_SCHEMA}.votes vo ON vo.resolution_id = r.id \
             LEFT JOIN {VOTING_SCHEMA}.voters v ON v.id = vo.voter_id \
             WHERE t.name = '{}' ORDER BY r.id",
            kind.as_str()
        ))?;

        let mut by_id: BTreeMap<String, Resolution> = BTreeMap::new();
        for row in &res.rows {
            let id = field(row, 0)?.to_string();
            let expiration = parse_i64(field(row, 1)?)?;
            let entry = by_id.entry(id).or_insert_with(|| Resolution {
                resolution_type: kind,
                expiration,
                voters: Vec::new(),
            });
            // Left join: a resolution with no votes yields NULL voter columns.
            if !field(row, 2)?.is_empty() {
                entry.voters.push(parse_voter(row, 2)?);
            }
        }
        Ok(by_id.into_values().collect())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlRestoreFixups;

impl RestoreFixups for SqlRestoreFixups {
    fn cleanup_resolutions_after_migration(
        &self,
        db: &dyn Pool,
        adjust_expiration: bool,
        start_height: i64,
    ) -> Result<(), StoreError> {
        let tx = db.begin_tx()?;
        tx.execute(&format!(
            "DELETE FROM {VOTING_SCHEMA}.resolutions WHERE type IN \
             (SELECT id FROM {VOTING_SCHEMA}.resolution_types WHERE name = '{MIGRATION_RESOLUTION_TYPE}')"
        ))?;
        if adjust_expiration {
            tx.execute(&format!(
                "UPDATE {VOTING_SCHEMA}.resolutions SET expiration = expiration - {start_height}"
            ))?;
        }
        tx.commit()
    }

    fn ensure_full_replica_identity(&self, db: &dyn Pool) -> Result<(), StoreError> {
        let tables = db.execute(&format!(
            "SELECT schemaname, tablename FROM pg_catalog.pg_tables \
             WHERE schemaname LIKE '{DATASET_SCHEMA_PREFIX}%'"
        ))?;
        if tables.rows.is_empty() {
            return Ok(());
        }

        let tx = db.begin_tx()?;
        for row in &tables.rows {
            let (schema, table) = (field(row, 0)?, field(row, 1)?);
            tx.execute(&format!(
                "ALTER TABLE \"{schema}\".\"{table}\" REPLICA IDENTITY FULL"
            ))?;
        }
        tx.commit()
    }
}

fn field(row: &[String], idx: usize) -> Result<&str, StoreError> {
    row.get(idx)
        .map(String::as_str)
        .ok_or_else(|| StoreError::UnexpectedResult(format!("missing column {idx}")))
}

fn parse_i64(s: &str) -> Result<i64, StoreError> {
    s.parse()
        .map_err(|e| StoreError::UnexpectedResult(format!("{s:?} is not an integer: {e}")))
}

fn parse_voter(row: &[String], offset: usize) -> Result<ValidatorRecord, StoreError> {
    let pub_key = PublicKey::from_hex(field(row, offset)?)
        .map_err(|e| StoreError::UnexpectedResult(e.to_string()))?;
    let power = parse_i64(field(row, offset + 1)?)?;
    Ok(ValidatorRecord { pub_key, power })
}
