use bytes::Bytes;
use chrono::Local;

/// Timestamp in the format Helm itself writes into `index.yaml`,
/// e.g. `2016-10-06T16:23:20.499814565-06:00`.
pub fn time_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.9f%:z").to_string()
}

/// Skeleton for a repository whose index does not exist yet.
pub struct EmptyIndex;

impl EmptyIndex {
    pub fn as_string(&self) -> String {
        format!("apiVersion: v1\nentries:\ngenerated: {}\n", time_now())
    }

    pub fn as_bytes(&self) -> Bytes {
        self.as_string().into_bytes().into()
    }
}

/// Count of leading space characters of an index line; the rewriter keys its
/// whole line classification off this.
pub fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}
