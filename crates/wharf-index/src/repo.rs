use crate::archive::ChartArchive;
use crate::mapping::IndexMapping;
use crate::misc::EmptyIndex;
use crate::rewriter::{self, record_field, DeleteSet, PendingCharts};
use std::sync::Arc;
use tokio::sync::Mutex;
use wharf_api_types::index::{IndexError, IndexResult, INDEX_YAML};
use wharf_api_types::storage::{BlobStorageProvider, Bytes, Metadata};

/// Key under which a rewritten index is staged before the commit move.
const STAGED_INDEX: &str = "index-out.yaml";

/// A chart to remove from the repository.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    /// Every version of the chart, and every backing archive.
    Chart(String),
    /// One version and its archive.
    Version { name: String, version: String },
}

/// The chart repository: blobs in a store, catalogued by `index.yaml`.
///
/// Index mutations snapshot the live document into a temp directory, rewrite
/// it there with [`crate::rewriter`], and commit the result back through the
/// store's atomic `move`. The whole sequence holds a process-wide lock, so
/// writers serialize while readers keep observing either the old or the new
/// document.
pub struct ChartRepo<S> {
    storage: Arc<S>,
    base_url: String,
    index_lock: Mutex<()>,
}

impl<S: BlobStorageProvider + Send + Sync> ChartRepo<S> {
    /// `base_url` is prefixed to the archive filename when composing
    /// `urls[0]` of new version records.
    pub fn new(storage: Arc<S>, base_url: String) -> Self {
        Self {
            storage,
            base_url,
            index_lock: Mutex::new(()),
        }
    }

    /// Add the charts stored under the given keys to the index.
    ///
    /// All of them appear in the next index version or none do. A chart that
    /// is already indexed at the same `(name, version)` fails the whole batch
    /// with [`IndexError::AlreadyPresent`] unless the digests match, in which
    /// case it is skipped.
    pub async fn add(&self, charts: &[String]) -> IndexResult<()> {
        if charts.is_empty() {
            return Ok(());
        }
        let mut pending = PendingCharts::new();
        for key in charts {
            let blob = self.storage.pull_file(key).await?;
            let archive = ChartArchive::new(blob.data)?;
            pending.insert(archive.chart_name(), archive.metadata(&self.base_url));
        }

        let _guard = self.index_lock.lock().await;
        let snapshot = if self.storage.exists(INDEX_YAML).await? {
            self.storage.pull_file(INDEX_YAML).await?.data
        } else {
            EmptyIndex.as_bytes()
        };

        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source.yaml");
        let out = dir.path().join("out.yaml");
        std::fs::write(&source, &snapshot)?;
        rewriter::add_charts(&source, &out, pending)?;
        self.commit(&out).await
        // temp dir is removed when `dir` drops, also on the error paths above
    }

    /// Remove the targeted charts from the index, then their archives from
    /// the store. Requires the index to exist.
    pub async fn delete(&self, targets: &[DeleteTarget]) -> IndexResult<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let _guard = self.index_lock.lock().await;
        if !self.storage.exists(INDEX_YAML).await? {
            return Err(IndexError::IndexMissing);
        }
        let snapshot = self.storage.pull_file(INDEX_YAML).await?.data;

        // resolve targets against the current document before rewriting, so
        // an unknown target fails with the store untouched
        let mut index = IndexMapping::from_slice(&snapshot)?;
        let mut set = DeleteSet::new();
        let mut blobs = Vec::new();
        for target in targets {
            match target {
                DeleteTarget::Chart(name) => {
                    let versions = index.entries_by_chart(name);
                    if versions.is_empty() {
                        return Err(IndexError::NotFound);
                    }
                    set.chart(name);
                    for record in &versions {
                        if let Some(version) = record_field(record, "version") {
                            blobs.push(format!("{name}-{version}.tgz"));
                        }
                    }
                }
                DeleteTarget::Version { name, version } => {
                    if index.by_chart_and_version(name, version).is_none() {
                        return Err(IndexError::NotFound);
                    }
                    set.version(name, version);
                    blobs.push(format!("{name}-{version}.tgz"));
                }
            }
        }

        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source.yaml");
        let out = dir.path().join("out.yaml");
        std::fs::write(&source, &snapshot)?;
        rewriter::delete_charts(&source, &out, &set)?;
        self.commit(&out).await?;

        for key in blobs {
            match self.storage.delete_file(&key).await {
                Ok(()) => {}
                Err(wharf_api_types::storage::StorageError::NotFound) => {
                    // an index entry may outlive its blob; nothing left to do
                    tracing::warn!(key, "archive of deleted chart was already absent");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Reindex every chart under a key prefix. Reserved; not implemented.
    pub async fn batch_update(&self, _prefix: &str) -> IndexResult<()> {
        Err(IndexError::ServiceError(
            std::io::Error::from(std::io::ErrorKind::Unsupported).into(),
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn commit(&self, out: &std::path::Path) -> IndexResult<()> {
        let rewritten: Bytes = std::fs::read(out)?.into();
        let meta = Metadata {
            content_type: Some("application/x-yaml"),
            content_length: Some(rewritten.len()),
            ..Metadata::default()
        };
        self.storage.put_file(STAGED_INDEX, rewritten, meta).await?;
        self.storage.move_file(STAGED_INDEX, INDEX_YAML).await?;
        Ok(())
    }
}
