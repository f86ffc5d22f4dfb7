//! Connection pools, executors and transactions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::StoreError;

/// Connection parameters shared by pools and the restore routine.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub pass: String,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Rows returned by a statement, every value rendered as text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Anything that can run a SQL statement.
pub trait Executor {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError>;
}

/// A read-only transaction. Dropping it without calling [`ReadTx::rollback`]
/// must also release it.
pub trait ReadTx: Executor {
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A writable transaction.
pub trait Tx: ReadTx {
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

pub trait TxMaker {
    fn begin_read_tx(&self) -> Result<Box<dyn ReadTx + '_>, StoreError>;
    fn begin_tx(&self) -> Result<Box<dyn Tx + '_>, StoreError>;
}

/// A pool of connections to one database.
pub trait Pool: Executor + TxMaker + Send + Sync {
    /// Release every connection. Further use is an error.
    fn close(&self) -> Result<(), StoreError>;
}

/// Opens pools on a database server.
pub trait PoolOpener: Send + Sync {
    fn open_pool(&self, db_name: &str, max_conns: u32) -> Result<Arc<dyn Pool>, StoreError>;
}
