#![cfg_attr(docsrs, feature(doc_cfg))]

pub use wharf_api_types::storage::{StorageError, StorageResult};

pub mod fs;

pub mod memory;
