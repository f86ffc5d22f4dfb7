//! Errors raised while parsing or loading fundamental types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid peer entry {entry:?}: expected identity@host:port")]
    InvalidPeerEntry { entry: String },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
