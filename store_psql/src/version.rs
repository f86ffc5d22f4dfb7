//! PostgreSQL client-tool version checks.
//!
//! Snapshots are produced with `pg_dump` and replayed with `psql`; every node
//! of a network must use the same major version so dumps stay byte-identical.

use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("failed to run {tool}: {reason}")]
    Exec { tool: String, reason: String },

    #[error("unrecognized {tool} version output: {output:?}")]
    Unparseable { tool: String, output: String },

    #[error("{tool} major version {found} is not the required {required}")]
    WrongMajor {
        tool: String,
        found: u32,
        required: u32,
    },
}

/// Split a numeric server version (`major * 10000 + minor`) and check that
/// the major matches exactly and the minor is at least `need_minor`.
pub fn validate_version(ver_num: u32, need_major: u32, need_minor: u32) -> (u32, u32, bool) {
    let major = ver_num / 10_000;
    let minor = ver_num % 10_000;
    (major, minor, major == need_major && minor >= need_minor)
}

/// Parse `(major, minor)` from `--version` output such as
/// `psql (PostgreSQL) 16.2 (Ubuntu 16.2-1.pgdg22.04+1)`.
pub fn parse_tool_version(output: &str) -> Option<(u32, u32)> {
    let version = output
        .split_once("(PostgreSQL)")
        .map(|(_, rest)| rest)
        .unwrap_or(output)
        .split_whitespace()
        .find(|tok| tok.starts_with(|c: char| c.is_ascii_digit()))?;

    let mut parts = version.split(|c: char| !c.is_ascii_digit());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// Run `<tool> --version` and require the given major version.
pub fn check_tool_version(tool: &str, required_major: u32) -> Result<(u32, u32), VersionError> {
    let output = Command::new(tool)
        .arg("--version")
        .output()
        .map_err(|e| VersionError::Exec {
            tool: tool.to_string(),
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(VersionError::Exec {
            tool: tool.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (major, minor) = parse_tool_version(&stdout).ok_or_else(|| VersionError::Unparseable {
        tool: tool.to_string(),
        output: stdout.trim().to_string(),
    })?;
    if major != required_major {
        return Err(VersionError::WrongMajor {
            tool: tool.to_string(),
            found: major,
            required: required_major,
        });
    }
    Ok((major, minor))
}
