//! Abstract storage traits for the bastion node bootstrap.
//!
//! The relational engine, the governance/voting tables and the restore tool
//! live outside this workspace. Every backend (the `psql` adapter, the
//! in-memory nullables used in tests) implements these traits; the bootstrap
//! depends only on the traits.

pub mod error;
pub mod migration;
pub mod pool;
pub mod restore;
pub mod schema;
pub mod voting;

pub use error::StoreError;
pub use migration::RestoreFixups;
pub use pool::{DbConfig, Executor, Pool, PoolOpener, QueryResult, ReadTx, Tx, TxMaker};
pub use restore::{HashingReader, SnapshotRestorer};
pub use schema::schema_exists;
pub use voting::{VotingReader, VOTING_SCHEMA};
