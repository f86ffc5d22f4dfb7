//! Restoring a database from a snapshot stream.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

use crate::{DbConfig, StoreError};

/// Streams a full store dump into a freshly created database.
pub trait SnapshotRestorer: Send + Sync {
    /// Consume `reader` into `db_name`. The implementation must hash exactly
    /// the bytes it consumed and fail with [`StoreError::HashMismatch`] when
    /// the digest differs from `expected_hash`.
    fn restore_from_stream(
        &self,
        reader: &mut dyn Read,
        db_name: &str,
        db: &DbConfig,
        expected_hash: &[u8],
    ) -> Result<(), StoreError>;
}

/// A reader that computes the SHA-256 of everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes_read: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Finish hashing and compare against `expected`.
    pub fn verify(self, expected: &[u8]) -> Result<u64, StoreError> {
        let bytes_read = self.bytes_read;
        let actual = self.hasher.finalize();
        if actual.as_slice() != expected {
            return Err(StoreError::HashMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
        Ok(bytes_read)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_digest() {
        let data = b"CREATE SCHEMA bastion_voting;\n";
        let expected: [u8; 32] = Sha256::digest(data).into();
        let mut reader = HashingReader::new(&data[..]);
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();
        assert_eq!(reader.verify(&expected).unwrap(), data.len() as u64);
        assert_eq!(sink, data);
    }

    #[test]
    fn rejects_other_digest() {
        let mut reader = HashingReader::new(&b"abc"[..]);
        io::copy(&mut reader, &mut io::sink()).unwrap();
        let err = reader.verify(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
    }
}
