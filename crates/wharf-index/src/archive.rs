use bytes::Bytes;
use flate2::read::GzDecoder;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::io::Read;
use tar::Archive;
use wharf_api_types::index::{IndexError, IndexResult};

const CHART_YAML: &str = "Chart.yaml";

/// A chart `.tgz` archive: the raw bytes plus the parsed `Chart.yaml`.
///
/// The digest and canonical filename are functions of the content alone; two
/// archives with identical bytes are indistinguishable.
#[derive(Debug)]
pub struct ChartArchive {
    content: Bytes,
    chart: Mapping,
}

impl ChartArchive {
    /// Scan the archive for the first entry whose path ends in `Chart.yaml`
    /// and parse it. Fails with [`IndexError::MalformedArchive`] when the
    /// bytes are not gzip, not tar, carry no `Chart.yaml`, or the manifest
    /// lacks `name`/`version`.
    pub fn new(content: Bytes) -> IndexResult<Self> {
        let text = Self::file(&content, CHART_YAML)?;
        let chart: Value = serde_yaml::from_str(&text)
            .map_err(|e| IndexError::MalformedArchive(format!("{CHART_YAML} is not YAML: {e}")))?;
        let chart = match chart {
            Value::Mapping(m) => m,
            _ => {
                return Err(IndexError::MalformedArchive(format!(
                    "{CHART_YAML} is not a mapping"
                )))
            }
        };
        for field in ["name", "version"] {
            if !chart.get(field).is_some_and(|v| v.is_string()) {
                return Err(IndexError::MalformedArchive(format!(
                    "{CHART_YAML} is missing the '{field}' field"
                )));
            }
        }
        Ok(Self { content, chart })
    }

    pub fn chart_name(&self) -> &str {
        self.chart.get("name").and_then(Value::as_str).unwrap()
    }

    pub fn chart_version(&self) -> &str {
        self.chart.get("version").and_then(Value::as_str).unwrap()
    }

    /// All manifest fields, in manifest order.
    pub fn chart_yaml(&self) -> &Mapping {
        &self.chart
    }

    /// How the archive is keyed in storage and addressed in URLs.
    pub fn name(&self) -> String {
        format!("{}-{}.tgz", self.chart_name(), self.chart_version())
    }

    /// Hex SHA-256 of the raw archive bytes, not of the decompressed stream.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(&self.content))
    }

    pub fn digest_bytes(&self) -> [u8; 32] {
        Sha256::digest(&self.content).into()
    }

    /// The version record for this archive: `urls`, `digest`, then every
    /// manifest field in manifest order. `created` is stamped by the index
    /// layer at write time.
    pub fn metadata(&self, base: &str) -> Mapping {
        let mut meta = Mapping::new();
        meta.insert(
            Value::from("urls"),
            Value::Sequence(vec![Value::from(format!("{base}{}", self.name()))]),
        );
        meta.insert(Value::from("digest"), Value::from(self.digest()));
        for (k, v) in &self.chart {
            meta.insert(k.clone(), v.clone());
        }
        meta
    }

    pub fn bytes(&self) -> &Bytes {
        &self.content
    }

    fn file(content: &[u8], name: &str) -> IndexResult<String> {
        let mut archive = Archive::new(GzDecoder::new(content));
        let entries = archive
            .entries()
            .map_err(|e| IndexError::MalformedArchive(format!("not a tgz archive: {e}")))?;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| IndexError::MalformedArchive(format!("broken tgz entry: {e}")))?;
            let matches = entry
                .path()
                .map(|p| p.to_string_lossy().ends_with(name))
                .unwrap_or(false);
            if matches {
                let mut text = String::new();
                entry
                    .read_to_string(&mut text)
                    .map_err(|e| IndexError::MalformedArchive(format!("unreadable {name}: {e}")))?;
                return Ok(text);
            }
        }
        Err(IndexError::MalformedArchive(format!(
            "'{name}' file wasn't found"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    pub(crate) fn tgz_with(entries: &[(&str, &str)]) -> Bytes {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, body.as_bytes()).unwrap();
        }
        let gz = builder.into_inner().unwrap();
        gz.finish().unwrap().into()
    }

    fn chart_tgz(name: &str, version: &str) -> Bytes {
        tgz_with(&[(
            &format!("{name}/Chart.yaml"),
            &format!("apiVersion: v1\ndescription: test chart\nname: {name}\nversion: {version}\n"),
        )])
    }

    #[test]
    fn parses_manifest_from_versioned_folder() {
        let archive = ChartArchive::new(chart_tgz("ark", "1.0.1")).unwrap();
        assert_eq!(archive.chart_name(), "ark");
        assert_eq!(archive.chart_version(), "1.0.1");
        assert_eq!(archive.name(), "ark-1.0.1.tgz");
    }

    #[test]
    fn digest_is_sha256_of_raw_bytes() {
        let bytes = chart_tgz("ark", "1.0.1");
        let expected = format!("{:x}", Sha256::digest(&bytes));
        let archive = ChartArchive::new(bytes).unwrap();
        assert_eq!(archive.digest(), expected);
    }

    #[test]
    fn metadata_builds_url_from_base() {
        let archive = ChartArchive::new(chart_tgz("ark", "1.0.1")).unwrap();
        let meta = archive.metadata("http://charts.local/");
        let urls = meta.get("urls").and_then(Value::as_sequence).unwrap();
        assert_eq!(urls[0], Value::from("http://charts.local/ark-1.0.1.tgz"));
        assert_eq!(
            meta.get("digest").and_then(Value::as_str).unwrap(),
            archive.digest()
        );
        assert_eq!(meta.get("description"), Some(&Value::from("test chart")));
    }

    #[test]
    fn manifest_fields_follow_urls_and_digest() {
        let archive = ChartArchive::new(chart_tgz("ark", "1.0.1")).unwrap();
        let keys: Vec<_> = archive
            .metadata("")
            .keys()
            .map(|k| k.as_str().unwrap().to_owned())
            .collect();
        assert_eq!(keys[..3], ["urls", "digest", "apiVersion"]);
    }

    #[test]
    fn first_chart_yaml_wins() {
        let bytes = tgz_with(&[
            ("ark/Chart.yaml", "name: ark\nversion: 1.0.1\n"),
            ("ark/charts/dep/Chart.yaml", "name: dep\nversion: 9.9.9\n"),
        ]);
        let archive = ChartArchive::new(bytes).unwrap();
        assert_eq!(archive.chart_name(), "ark");
    }

    #[test]
    fn rejects_plain_bytes() {
        let err = ChartArchive::new(Bytes::from_static(b"not a tgz")).unwrap_err();
        assert!(matches!(err, IndexError::MalformedArchive(_)));
    }

    #[test]
    fn rejects_archive_without_manifest() {
        let bytes = tgz_with(&[("ark/values.yaml", "replicas: 1\n")]);
        let err = ChartArchive::new(bytes).unwrap_err();
        assert!(matches!(err, IndexError::MalformedArchive(_)));
    }

    #[test]
    fn rejects_manifest_without_version() {
        let bytes = tgz_with(&[("ark/Chart.yaml", "name: ark\n")]);
        let err = ChartArchive::new(bytes).unwrap_err();
        assert!(matches!(err, IndexError::MalformedArchive(_)));
    }
}
