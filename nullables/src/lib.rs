//! Nullable infrastructure for deterministic testing.
//!
//! The database server, the voting tables and the restore tool are
//! abstracted behind the `bastion-store` traits. This crate provides
//! in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what was asked of them so tests can assert on it
//!
//! Usage: swap real implementations for nullables in tests.

pub mod db;
pub mod restore;
pub mod voting;

pub use db::{NullDb, NullPool};
pub use restore::{NullRestoreFixups, NullRestorer, RestoreCall};
pub use voting::NullVoting;
