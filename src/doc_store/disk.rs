/// Disk-based document storage backend
use crate::{
    doc_store::DocumentBackend,
    error::{HubError, HubResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores documents on the local filesystem under a per-account
/// directory: {base}/{user_id}/{document_id}
#[derive(Clone)]
pub struct DiskDocumentBackend {
    base_path: PathBuf,
}

impl DiskDocumentBackend {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn document_path(&self, user_id: &str, document_id: &str) -> PathBuf {
        self.base_path.join(user_id).join(document_id)
    }

    async fn ensure_account_dir(&self, user_id: &str, document_id: &str) -> HubResult<PathBuf> {
        let path = self.document_path(user_id, document_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                HubError::DocumentStorage(format!("Failed to create document directory: {}", e))
            })?;
        }
        Ok(path)
    }
}

#[async_trait]
impl DocumentBackend for DiskDocumentBackend {
    async fn put(&self, user_id: &str, document_id: &str, data: Vec<u8>) -> HubResult<()> {
        let path = self.ensure_account_dir(user_id, document_id).await?;

        fs::write(&path, data).await.map_err(|e| {
            HubError::DocumentStorage(format!("Failed to write document {}: {}", document_id, e))
        })?;

        Ok(())
    }

    async fn get(&self, user_id: &str, document_id: &str) -> HubResult<Option<Vec<u8>>> {
        let path = self.document_path(user_id, document_id);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HubError::DocumentStorage(format!(
                "Failed to read document {}: {}",
                document_id, e
            ))),
        }
    }

    async fn delete(&self, user_id: &str, document_id: &str) -> HubResult<()> {
        let path = self.document_path(user_id, document_id);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HubError::DocumentStorage(format!(
                "Failed to delete document {}: {}",
                document_id, e
            ))),
        }
    }

    async fn exists(&self, user_id: &str, document_id: &str) -> HubResult<bool> {
        Ok(self.document_path(user_id, document_id).exists())
    }

    async fn size(&self, user_id: &str, document_id: &str) -> HubResult<Option<u64>> {
        let path = self.document_path(user_id, document_id);

        match fs::metadata(&path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HubError::DocumentStorage(format!(
                "Failed to stat document {}: {}",
                document_id, e
            ))),
        }
    }
}
