//! Invocation of the `psql` binary.

use std::io::Read;
use std::process::{Command, Stdio};

use bastion_store::{DbConfig, QueryResult, StoreError};

/// Field separator used for unaligned output (ASCII unit separator).
const FIELD_SEP: char = '\u{1f}';

/// Builds and runs `psql` commands against one database.
#[derive(Clone, Debug)]
pub struct PsqlRunner {
    db: DbConfig,
    db_name: String,
    program: String,
}

impl PsqlRunner {
    pub fn new(db: DbConfig, db_name: impl Into<String>) -> Self {
        Self {
            db,
            db_name: db_name.into(),
            program: "psql".to_string(),
        }
    }

    /// Use a different client binary (e.g. an absolute path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-X")
            .arg("-q")
            .args(["-v", "ON_ERROR_STOP=1"])
            .args(["-d", &self.db_name]);
        if !self.db.host.is_empty() {
            cmd.args(["-h", &self.db.host]);
        }
        if !self.db.port.is_empty() {
            cmd.args(["-p", &self.db.port]);
        }
        if !self.db.user.is_empty() {
            cmd.args(["-U", &self.db.user]);
        }
        if !self.db.pass.is_empty() {
            cmd.env("PGPASSWORD", &self.db.pass);
        }
        cmd
    }

    /// Run `sql` and parse the unaligned output.
    pub fn query(&self, sql: &str) -> Result<QueryResult, StoreError> {
        let output = self
            .command()
            .arg("-A")
            .args(["-F", &FIELD_SEP.to_string()])
            .args(["-P", "footer=off"])
            .args(["-c", sql])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StoreError::Connection(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(StoreError::Query(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_unaligned(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Feed `input` to `psql` on stdin, as when replaying a dump.
    pub fn feed(&self, input: &mut dyn Read) -> Result<(), StoreError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StoreError::Connection(format!("failed to run {}: {e}", self.program)))?;

        let copied = match child.stdin.take() {
            Some(mut stdin) => std::io::copy(input, &mut stdin).map(|_| ()),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(StoreError::Restore(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        copied.map_err(StoreError::from)
    }
}

/// Parse `psql -A` output: a header line followed by one line per row.
fn parse_unaligned(out: &str) -> QueryResult {
    let mut lines = out.lines().filter(|l| !l.is_empty());
    let columns = match lines.next() {
        Some(header) => header.split(FIELD_SEP).map(str::to_string).collect(),
        None => return QueryResult::default(),
    };
    let rows = lines
        .map(|l| l.split(FIELD_SEP).map(str::to_string).collect())
        .collect();
    QueryResult { columns, rows }
}
