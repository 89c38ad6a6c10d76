use crate::misc::time_now;
use serde_yaml::{Mapping, Sequence, Value};
use wharf_api_types::index::{IndexError, IndexResult};

const ENTRIES: &str = "entries";
const GENERATED: &str = "generated";

/// In-memory view of an `index.yaml` document: `apiVersion`, `generated`,
/// and `entries: name -> [version record]`. Key order and version order are
/// preserved as encountered.
pub struct IndexMapping {
    mapping: Mapping,
}

impl Default for IndexMapping {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexMapping {
    pub fn new() -> Self {
        Self::from_str("apiVersion: v1\nentries:\n").unwrap()
    }

    pub fn from_str(yaml: &str) -> IndexResult<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        let mapping = match value {
            Value::Mapping(m) => m,
            _ => {
                return Err(IndexError::ServiceError(anyhow::anyhow!(
                    "index document is not a mapping"
                )))
            }
        };
        Ok(Self { mapping })
    }

    pub fn from_slice(bytes: &[u8]) -> IndexResult<Self> {
        Self::from_str(std::str::from_utf8(bytes).map_err(|e| {
            IndexError::ServiceError(anyhow::anyhow!("index document is not UTF-8: {e}"))
        })?)
    }

    /// The `entries` mapping, created empty on first access.
    pub fn entries(&mut self) -> &mut Mapping {
        let entry = self
            .mapping
            .entry(Value::from(ENTRIES))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            // `entries:` with no children parses as null
            *entry = Value::Mapping(Mapping::new());
        }
        entry.as_mapping_mut().unwrap()
    }

    /// Version records of one chart, oldest first.
    pub fn entries_by_chart(&mut self, chart_name: &str) -> Vec<Mapping> {
        self.entries()
            .get(chart_name)
            .and_then(Value::as_sequence)
            .map(|seq| {
                seq.iter()
                    .filter_map(Value::as_mapping)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn by_chart_and_version(&mut self, chart_name: &str, version: &str) -> Option<Mapping> {
        self.entries_by_chart(chart_name)
            .into_iter()
            .find(|record| record.get("version") == Some(&Value::from(version)))
    }

    /// Register a chart with the given version records; no-op when the chart
    /// is already present.
    pub fn add_new_chart(&mut self, name: &str, versions: Vec<Mapping>) {
        let entries = self.entries();
        if !entries.contains_key(name) {
            entries.insert(
                Value::from(name),
                Value::Sequence(versions.into_iter().map(Value::Mapping).collect()),
            );
        }
    }

    /// Append a version record to a chart's list, creating the chart.
    pub fn push_version(&mut self, name: &str, record: Mapping) {
        self.add_new_chart(name, Vec::new());
        let list = self.entries().get_mut(name).unwrap();
        if !list.is_sequence() {
            *list = Value::Sequence(Sequence::new());
        }
        list.as_sequence_mut().unwrap().push(Value::Mapping(record));
    }

    pub fn remove_chart(&mut self, name: &str) -> bool {
        self.entries().remove(name).is_some()
    }

    /// Dump the document as block-style YAML, refreshing `generated`.
    pub fn dump(&mut self) -> IndexResult<String> {
        self.entries();
        self.mapping
            .insert(Value::from(GENERATED), Value::from(time_now()));
        Ok(serde_yaml::to_string(&self.mapping)?)
    }

    /// Like [`Self::dump`], but yields nothing when `entries` is empty,
    /// for consumers that prefer absence to an empty skeleton.
    pub fn to_bytes_opt(&mut self) -> IndexResult<Option<Vec<u8>>> {
        if self.entries().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.dump()?.into_bytes()))
    }
}
