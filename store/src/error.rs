use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("unexpected result: {0}")]
    UnexpectedResult(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("snapshot hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("restore failed: {0}")]
    Restore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}
