pub use error::{IndexError, IndexResult};

mod error;

/// Storage key of the live repository catalogue.
pub const INDEX_YAML: &str = "index.yaml";
