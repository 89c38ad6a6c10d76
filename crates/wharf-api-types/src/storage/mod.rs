pub use bytes::Bytes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub use error::{StorageError, StorageResult};

mod error;

/// A key/value blob store holding chart archives and the repository index.
///
/// `put_file` must replace the destination atomically, and `move_file` must
/// be atomic within the backend's semantics; the index commit relies on both.
#[async_trait]
pub trait BlobStorageProvider {
    async fn exists(&self, key: &str) -> StorageResult<bool>;
    async fn pull_file(&self, key: &str) -> StorageResult<FileResponse>;
    async fn put_file(&self, key: &str, file_bytes: Bytes, meta: Metadata) -> StorageResult<()>;
    async fn move_file(&self, src: &str, dst: &str) -> StorageResult<()>;
    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
    async fn delete_file(&self, key: &str) -> StorageResult<()>;

    async fn healthcheck(&self) -> anyhow::Result<()>;
}

pub struct FileResponse {
    pub last_modified: Option<DateTime<Utc>>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub content_type: Option<&'static str>,
    pub content_length: Option<usize>,
    pub cache_control: Option<String>,
    pub sha256: Option<[u8; 32]>,
    pub kv: HashMap<String, String>,
}
