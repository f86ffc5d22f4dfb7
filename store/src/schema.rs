//! Schema existence probe.

use crate::{Executor, StoreError};

/// Whether `schema` exists in the database behind `db`.
pub fn schema_exists<E: Executor + ?Sized>(db: &E, schema: &str) -> Result<bool, StoreError> {
    if schema.is_empty()
        || !schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::InvalidIdentifier(schema.to_string()));
    }

    let query =
        format!("SELECT 1 FROM information_schema.schemata WHERE schema_name = '{schema}'");
    let res = db.execute(&query)?;
    match res.rows.len() {
        0 => Ok(false),
        1 => Ok(true),
        n => Err(StoreError::UnexpectedResult(format!(
            "{n} schemas found with name {schema}"
        ))),
    }
}
