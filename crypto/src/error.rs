use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("public key is not a valid ed25519 point")]
    InvalidPublicKey,

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
