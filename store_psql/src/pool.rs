//! `psql`-backed pools and transactions.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bastion_store::{
    DbConfig, Executor, Pool, PoolOpener, QueryResult, ReadTx, StoreError, Tx, TxMaker,
};

use crate::PsqlRunner;

/// Opens [`PsqlPool`]s on one server.
#[derive(Clone, Debug)]
pub struct PsqlOpener {
    db: DbConfig,
}

impl PsqlOpener {
    pub fn new(db: DbConfig) -> Self {
        Self { db }
    }
}

impl PoolOpener for PsqlOpener {
    fn open_pool(&self, db_name: &str, max_conns: u32) -> Result<Arc<dyn Pool>, StoreError> {
        let pool = PsqlPool::new(PsqlRunner::new(self.db.clone(), db_name), max_conns);
        // Fail at open time rather than on first use.
        pool.execute("SELECT 1")?;
        Ok(Arc::new(pool))
    }
}

pub struct PsqlPool {
    runner: PsqlRunner,
    max_conns: u32,
    closed: AtomicBool,
}

impl PsqlPool {
    pub fn new(runner: PsqlRunner, max_conns: u32) -> Self {
        Self {
            runner,
            max_conns,
            closed: AtomicBool::new(false),
        }
    }

    pub fn max_conns(&self) -> u32 {
        self.max_conns
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Connection(format!(
                "pool for {} is closed",
                self.runner.db_name()
            )));
        }
        Ok(())
    }
}

impl Executor for PsqlPool {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError> {
        self.ensure_open()?;
        self.runner.query(sql)
    }
}

impl TxMaker for PsqlPool {
    fn begin_read_tx(&self) -> Result<Box<dyn ReadTx + '_>, StoreError> {
        self.ensure_open()?;
        Ok(Box::new(PsqlReadTx { pool: self }))
    }

    fn begin_tx(&self) -> Result<Box<dyn Tx + '_>, StoreError> {
        self.ensure_open()?;
        Ok(Box::new(PsqlTx {
            pool: self,
            statements: RefCell::new(Vec::new()),
        }))
    }
}

impl Pool for PsqlPool {
    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Connection(format!(
                "pool for {} already closed",
                self.runner.db_name()
            )));
        }
        tracing::debug!(db = self.runner.db_name(), "psql pool closed");
        Ok(())
    }
}

/// Each statement runs in its own read-only transaction; there is no
/// snapshot shared between statements.
struct PsqlReadTx<'a> {
    pool: &'a PsqlPool,
}

impl Executor for PsqlReadTx<'_> {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError> {
        self.pool.ensure_open()?;
        self.pool
            .runner
            .query(&format!("BEGIN READ ONLY; {sql}; COMMIT;"))
    }
}

impl ReadTx for PsqlReadTx<'_> {
    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Writes are buffered and sent as one `BEGIN ... COMMIT` script on commit.
/// Statements executed inside the transaction return no rows.
struct PsqlTx<'a> {
    pool: &'a PsqlPool,
    statements: RefCell<Vec<String>>,
}

impl Executor for PsqlTx<'_> {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError> {
        self.pool.ensure_open()?;
        self.statements.borrow_mut().push(sql.to_string());
        Ok(QueryResult::default())
    }
}

impl ReadTx for PsqlTx<'_> {
    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.statements.borrow_mut().clear();
        Ok(())
    }
}

impl Tx for PsqlTx<'_> {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let statements = self.statements.take();
        if statements.is_empty() {
            return Ok(());
        }
        let script = format!("BEGIN; {}; COMMIT;", statements.join("; "));
        self.pool
            .runner
            .query(&script)
            .map(|_| ())
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> PsqlPool {
        let db = DbConfig {
            host: "127.0.0.1".into(),
            port: "5432".into(),
            user: "bastion".into(),
            pass: String::new(),
        };
        PsqlPool::new(
            PsqlRunner::new(db, "bastion").with_program("/nonexistent/psql"),
            4,
        )
    }

    #[test]
    fn closed_pool_rejects_use() {
        let p = pool();
        p.close().unwrap();
        assert!(p.execute("SELECT 1").is_err());
        assert!(p.begin_read_tx().is_err());
        assert!(p.close().is_err());
    }

    #[test]
    fn write_tx_buffers_until_commit() {
        let p = pool();
        let tx = p.begin_tx().unwrap();
        let res = tx.execute("UPDATE t SET x = 1").unwrap();
        assert!(res.rows.is_empty());
        // The binary does not exist, so only the commit touches it.
        assert!(tx.commit().is_err());
    }

    #[test]
    fn empty_tx_commits_without_running() {
        let p = pool();
        let tx = p.begin_tx().unwrap();
        tx.commit().unwrap();
    }
}
