//! Nullable database server. Schemas and pools are held in memory.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bastion_store::{
    Executor, Pool, PoolOpener, QueryResult, ReadTx, StoreError, Tx, TxMaker,
};

#[derive(Default)]
struct DbState {
    schemas: HashSet<String>,
    executed: Vec<String>,
    opened: usize,
    closed: usize,
    fail_open: bool,
}

/// An in-memory database server. Clones share state, so a test can keep a
/// handle while the code under test opens pools through another.
#[derive(Clone, Default)]
pub struct NullDb {
    state: Arc<Mutex<DbState>>,
}

impl NullDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// A server whose database already contains `schema`.
    pub fn with_schema(schema: &str) -> Self {
        let db = Self::new();
        db.add_schema(schema);
        db
    }

    pub fn add_schema(&self, schema: &str) {
        self.state.lock().unwrap().schemas.insert(schema.to_string());
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.state.lock().unwrap().schemas.contains(schema)
    }

    /// Make every subsequent `open_pool` fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Every statement executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn pools_opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn pools_closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Pools opened and not yet closed.
    pub fn open_pools(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.opened - state.closed
    }

    fn run(&self, sql: &str) -> QueryResult {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());

        if sql.contains("information_schema.schemata") {
            let exists = quoted_after(sql, "schema_name = ")
                .is_some_and(|name| state.schemas.contains(name));
            return QueryResult {
                columns: vec!["?column?".into()],
                rows: if exists { vec![vec!["1".into()]] } else { Vec::new() },
            };
        }
        QueryResult::default()
    }
}

/// Extract the single-quoted literal following `marker`.
fn quoted_after<'a>(sql: &'a str, marker: &str) -> Option<&'a str> {
    let rest = &sql[sql.find(marker)? + marker.len()..];
    let rest = rest.strip_prefix('\'')?;
    rest.find('\'').map(|end| &rest[..end])
}

impl PoolOpener for NullDb {
    fn open_pool(&self, db_name: &str, max_conns: u32) -> Result<Arc<dyn Pool>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(StoreError::Connection(format!("cannot open {db_name}")));
        }
        state.opened += 1;
        Ok(Arc::new(NullPool {
            db: self.clone(),
            name: db_name.to_string(),
            max_conns,
            closed: AtomicBool::new(false),
        }))
    }
}

/// A pool handed out by [`NullDb`].
pub struct NullPool {
    db: NullDb,
    name: String,
    max_conns: u32,
    closed: AtomicBool,
}

impl NullPool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_conns(&self) -> u32 {
        self.max_conns
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Connection(format!("{} is closed", self.name)));
        }
        Ok(())
    }
}

impl Executor for NullPool {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError> {
        self.ensure_open()?;
        Ok(self.db.run(sql))
    }
}

impl TxMaker for NullPool {
    fn begin_read_tx(&self) -> Result<Box<dyn ReadTx + '_>, StoreError> {
        self.ensure_open()?;
        Ok(Box::new(NullTx { pool: self }))
    }

    fn begin_tx(&self) -> Result<Box<dyn Tx + '_>, StoreError> {
        self.ensure_open()?;
        Ok(Box::new(NullTx { pool: self }))
    }
}

impl Pool for NullPool {
    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Connection(format!(
                "{} closed twice",
                self.name
            )));
        }
        self.db.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

struct NullTx<'a> {
    pool: &'a NullPool,
}

impl Executor for NullTx<'_> {
    fn execute(&self, sql: &str) -> Result<QueryResult, StoreError> {
        self.pool.execute(sql)
    }
}

impl ReadTx for NullTx<'_> {
    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Tx for NullTx<'_> {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
