use crate::archive::ChartArchive;
use crate::mapping::IndexMapping;
use crate::misc::time_now;
use serde_yaml::{Mapping, Value};
use std::sync::Arc;
use wharf_api_types::index::{IndexError, IndexResult, INDEX_YAML};
use wharf_api_types::storage::{BlobStorageProvider, Metadata};

/// Load-mutate-dump maintenance of `index.yaml`.
///
/// The simple path for a single archive the caller already holds in memory;
/// outcome-equivalent to the streaming rewriter on a one-element input, at
/// the price of materializing the whole document. Callers coordinate their
/// own write serialization.
pub struct IndexYaml<S> {
    storage: Arc<S>,
    base: String,
}

impl<S: BlobStorageProvider + Send + Sync> IndexYaml<S> {
    pub fn new(storage: Arc<S>, base: String) -> Self {
        Self { storage, base }
    }

    /// Insert the archive's version record, unless that version is already
    /// listed for the chart.
    pub async fn update(&self, archive: &ChartArchive) -> IndexResult<()> {
        let mut index = self.load(false).await?;
        let name = archive.chart_name();
        if index
            .by_chart_and_version(name, archive.chart_version())
            .is_none()
        {
            let mut record = Mapping::new();
            record.insert(Value::from("created"), Value::from(time_now()));
            for (k, v) in archive.metadata(&self.base) {
                record.insert(k, v);
            }
            index.push_version(name, record);
        }
        self.save(index).await
    }

    /// Drop a chart and all its versions. [`IndexError::IndexMissing`] when
    /// the index does not exist, [`IndexError::NotFound`] when the chart is
    /// not listed.
    pub async fn delete_by_name(&self, name: &str) -> IndexResult<()> {
        let mut index = self.load(true).await?;
        if !index.remove_chart(name) {
            return Err(IndexError::NotFound);
        }
        self.save(index).await
    }

    /// Drop a single version, and the whole chart when it was the last one.
    pub async fn delete_by_name_and_version(&self, name: &str, version: &str) -> IndexResult<()> {
        let mut index = self.load(true).await?;
        let remaining: Vec<Mapping> = index
            .entries_by_chart(name)
            .into_iter()
            .filter(|record| record.get("version") != Some(&Value::from(version)))
            .collect();
        if remaining.len() == index.entries_by_chart(name).len() {
            return Err(IndexError::NotFound);
        }
        index.remove_chart(name);
        if !remaining.is_empty() {
            index.add_new_chart(name, remaining);
        }
        self.save(index).await
    }

    async fn load(&self, must_exist: bool) -> IndexResult<IndexMapping> {
        if self.storage.exists(INDEX_YAML).await? {
            let blob = self.storage.pull_file(INDEX_YAML).await?;
            IndexMapping::from_slice(&blob.data)
        } else if must_exist {
            Err(IndexError::IndexMissing)
        } else {
            Ok(IndexMapping::new())
        }
    }

    async fn save(&self, mut index: IndexMapping) -> IndexResult<()> {
        let bytes = index.dump()?.into_bytes();
        let meta = Metadata {
            content_type: Some("application/x-yaml"),
            content_length: Some(bytes.len()),
            ..Metadata::default()
        };
        self.storage
            .put_file(INDEX_YAML, bytes.into(), meta)
            .await
            .map_err(|e| IndexError::ServiceError(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ChartArchive;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use wharf_storage::memory::MemoryStorageProvider;

    fn archive(name: &str, version: &str) -> ChartArchive {
        let manifest = format!("apiVersion: v1\nname: {name}\nversion: {version}\n");
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("{name}/Chart.yaml"),
                manifest.as_bytes(),
            )
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        ChartArchive::new(bytes.into()).unwrap()
    }

    fn updater() -> (Arc<MemoryStorageProvider>, IndexYaml<MemoryStorageProvider>) {
        let storage = Arc::new(MemoryStorageProvider::new());
        let index = IndexYaml::new(storage.clone(), "http://charts.local/".to_owned());
        (storage, index)
    }

    async fn live_index(storage: &MemoryStorageProvider) -> IndexMapping {
        let blob = storage.pull_file(INDEX_YAML).await.unwrap();
        IndexMapping::from_slice(&blob.data).unwrap()
    }

    #[tokio::test]
    async fn update_creates_index_and_skips_duplicates() {
        let (storage, index) = updater();
        let ark = archive("ark", "1.0.1");
        index.update(&ark).await.unwrap();
        index.update(&ark).await.unwrap();

        let mut live = live_index(&storage).await;
        assert_eq!(live.entries_by_chart("ark").len(), 1);
        let record = live.by_chart_and_version("ark", "1.0.1").unwrap();
        assert!(record.get("created").is_some());
        assert_eq!(record.get("digest"), Some(&Value::from(ark.digest())));
    }

    #[tokio::test]
    async fn delete_by_name_requires_index() {
        let (_storage, index) = updater();
        assert!(matches!(
            index.delete_by_name("ark").await,
            Err(IndexError::IndexMissing)
        ));
    }

    #[tokio::test]
    async fn deleting_last_version_drops_the_chart() {
        let (storage, index) = updater();
        index.update(&archive("ark", "1.0.1")).await.unwrap();
        index.update(&archive("tomcat", "0.4.1")).await.unwrap();

        index
            .delete_by_name_and_version("ark", "1.0.1")
            .await
            .unwrap();

        let mut live = live_index(&storage).await;
        assert!(live.entries_by_chart("ark").is_empty());
        assert_eq!(live.entries_by_chart("tomcat").len(), 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_version_is_not_found() {
        let (_storage, index) = updater();
        index.update(&archive("ark", "1.0.1")).await.unwrap();
        assert!(matches!(
            index.delete_by_name_and_version("ark", "0.0.0").await,
            Err(IndexError::NotFound)
        ));
    }
}
