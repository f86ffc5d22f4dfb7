//! Storage backend that drives a PostgreSQL server through the `psql`
//! client tool.
//!
//! Every statement runs as its own `psql` invocation, so a "pool" here is
//! only a set of connection parameters plus an open/closed flag. The
//! adapter exists so the node binary can reach a real server without the
//! bootstrap code linking a database driver.

pub mod pool;
pub mod restore;
pub mod runner;
pub mod version;
pub mod voting;

pub use pool::{PsqlOpener, PsqlPool};
pub use restore::PsqlRestorer;
pub use runner::PsqlRunner;
pub use version::{check_tool_version, parse_tool_version, validate_version, VersionError};
pub use voting::{SqlRestoreFixups, SqlVotingReader};
