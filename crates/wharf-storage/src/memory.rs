use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use wharf_api_types::storage::{
    BlobStorageProvider, Bytes, FileResponse, Metadata, StorageError, StorageResult,
};

/// Blob store held entirely in memory. Intended for tests and ephemeral
/// deployments; contents vanish with the process.
#[derive(Default)]
pub struct MemoryStorageProvider {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorageProvider for MemoryStorageProvider {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.blobs.read().unwrap().contains_key(key))
    }

    async fn pull_file(&self, key: &str) -> StorageResult<FileResponse> {
        let blobs = self.blobs.read().unwrap();
        let data = blobs.get(key).cloned().ok_or(StorageError::NotFound)?;
        Ok(FileResponse {
            last_modified: Some(Utc::now()),
            data,
        })
    }

    async fn put_file(&self, key: &str, file_bytes: Bytes, _meta: Metadata) -> StorageResult<()> {
        self.blobs
            .write()
            .unwrap()
            .insert(key.to_owned(), file_bytes);
        Ok(())
    }

    async fn move_file(&self, src: &str, dst: &str) -> StorageResult<()> {
        let mut blobs = self.blobs.write().unwrap();
        let data = blobs.remove(src).ok_or(StorageError::NotFound)?;
        blobs.insert(dst.to_owned(), data);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let blobs = self.blobs.read().unwrap();
        Ok(blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        self.blobs
            .write()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn healthcheck(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_move_delete_lifecycle() {
        let mem = MemoryStorageProvider::new();
        mem.put_file("a.tgz", Bytes::from_static(b"a"), Metadata::default())
            .await
            .unwrap();
        mem.move_file("a.tgz", "b.tgz").await.unwrap();
        assert!(!mem.exists("a.tgz").await.unwrap());
        assert_eq!(mem.pull_file("b.tgz").await.unwrap().data.as_ref(), b"a");
        mem.delete_file("b.tgz").await.unwrap();
        assert!(matches!(
            mem.delete_file("b.tgz").await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_prefix_filters() {
        let mem = MemoryStorageProvider::new();
        for key in ["ark-1.0.1.tgz", "tomcat-0.4.1.tgz", "index.yaml"] {
            mem.put_file(key, Bytes::from_static(b"x"), Metadata::default())
                .await
                .unwrap();
        }
        let keys = mem.list_prefix("ark-").await.unwrap();
        assert_eq!(keys, vec!["ark-1.0.1.tgz"]);
    }
}
