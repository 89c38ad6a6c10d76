use async_trait::async_trait;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use wharf_api_types::storage::{
    BlobStorageProvider, Bytes, FileResponse, Metadata, StorageError, StorageResult,
};

/// Blob store rooted at a directory on the local filesystem.
///
/// Writes land in a sibling temp file and are persisted with a rename, so a
/// reader never observes a half-written blob and `move_file` is atomic on the
/// same device.
pub struct FsStorageProvider {
    root: PathBuf,
}

impl FsStorageProvider {
    pub fn new(root: PathBuf) -> StorageResult<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn abs_path(&self, key: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(key);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes {
            return Err(StorageError::ServiceError(
                io::Error::from(io::ErrorKind::InvalidInput).into(),
            ));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStorageProvider for FsStorageProvider {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.abs_path(key)?.is_file())
    }

    async fn pull_file(&self, key: &str) -> StorageResult<FileResponse> {
        let mut file = File::open(self.abs_path(key)?)?;
        let meta = file.metadata()?;
        let last_modified = meta.modified().ok().map(From::from);
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(FileResponse {
            last_modified,
            data: buf.into(),
        })
    }

    async fn put_file(&self, key: &str, file_bytes: Bytes, _meta: Metadata) -> StorageResult<()> {
        let path = self.abs_path(key)?;
        let parent = path.parent().unwrap();
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&file_bytes)?;
        tmp.persist(path)
            .map_err(|e| StorageError::ServiceError(e.into()))?;
        Ok(())
    }

    async fn move_file(&self, src: &str, dst: &str) -> StorageResult<()> {
        let from = self.abs_path(src)?;
        let to = self.abs_path(dst)?;
        let parent = to.parent().unwrap();
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from, to)?;
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut out = Vec::new();
        append_dir(&self.root, &self.root, &mut out)?;
        out.retain(|key| key.starts_with(prefix));
        Ok(out)
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        let path = self.abs_path(key)?;
        std::fs::remove_file(path)?;
        Ok(())
    }

    async fn healthcheck(&self) -> anyhow::Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            anyhow::bail!("root not a dir")
        }
    }
}

fn append_dir(root: &Path, path: &Path, out: &mut Vec<String>) -> StorageResult<()> {
    for e in std::fs::read_dir(path)? {
        let e = e?;
        let ty = e.file_type()?;
        if ty.is_dir() {
            append_dir(root, &e.path(), out)?;
        } else if let Ok(rel) = e.path().strip_prefix(root).map(Path::to_path_buf) {
            if let Ok(key) = rel.into_os_string().into_string() {
                out.push(key);
            }
        }
    }
    Ok(())
}
