/// Verification document storage
///
/// Stores uploaded identity documents outside the database. Paths are
/// scoped per account so one user's documents can never collide with
/// another's.

pub mod disk;

pub use disk::DiskDocumentBackend;

use crate::error::HubResult;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Document storage backend trait
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Store a document for an account
    async fn put(&self, user_id: &str, document_id: &str, data: Vec<u8>) -> HubResult<()>;

    /// Retrieve a document
    async fn get(&self, user_id: &str, document_id: &str) -> HubResult<Option<Vec<u8>>>;

    /// Delete a document
    async fn delete(&self, user_id: &str, document_id: &str) -> HubResult<()>;

    /// Check if a document exists
    async fn exists(&self, user_id: &str, document_id: &str) -> HubResult<bool>;

    /// Size of a stored document in bytes
    async fn size(&self, user_id: &str, document_id: &str) -> HubResult<Option<u64>>;
}

/// SHA-256 checksum of document content, hex encoded
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable() {
        let a = checksum(b"passport scan");
        let b = checksum(b"passport scan");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, checksum(b"utility bill"));
    }
}
