//! The index engine of the wharf chart repository.
//!
//! Charts arrive as gzip-compressed tar archives carrying a `Chart.yaml`
//! manifest. [`archive::ChartArchive`] extracts that manifest and derives the
//! canonical `{name}-{version}.tgz` storage key. The repository catalogue,
//! `index.yaml`, is maintained two ways: [`rewriter`] splices entries in and
//! out with a single line-oriented pass that leaves untouched lines
//! byte-for-byte intact, while [`full_index::IndexYaml`] is the simpler
//! load-mutate-dump path for a single archive already held in memory.
//! [`repo::ChartRepo`] orchestrates the streaming path against a blob store:
//! snapshot the live index into a temp directory, rewrite it there, commit
//! the result with an atomic move.

pub use wharf_api_types::index::{IndexError, IndexResult, INDEX_YAML};

pub mod archive;
pub mod chart_name;
pub mod full_index;
pub mod mapping;
pub mod misc;
pub mod repo;
pub mod rewriter;
