use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use wharf_api_types::storage::{BlobStorageProvider, Metadata};
use wharf_storage::memory::MemoryStorageProvider;

pub const BASE_URL: &str = "http://charts.local/";

/// A minimal but real chart archive for the given name and version.
pub fn chart_tgz(name: &str, version: &str) -> Bytes {
    let manifest = format!(
        "apiVersion: v1\ndescription: A test chart\nname: {name}\nversion: {version}\n"
    );
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
    let gz = builder.into_inner().unwrap();
    gz.finish().unwrap().into()
}

/// Store a chart archive under its canonical key.
pub async fn seed_chart(storage: &MemoryStorageProvider, name: &str, version: &str) -> String {
    let key = format!("{name}-{version}.tgz");
    storage
        .put_file(&key, chart_tgz(name, version), Metadata::default())
        .await
        .unwrap();
    key
}

/// The live index as a string, for assertions.
pub async fn index_text(storage: &MemoryStorageProvider) -> String {
    let blob = storage.pull_file("index.yaml").await.unwrap();
    String::from_utf8(blob.data.to_vec()).unwrap()
}
