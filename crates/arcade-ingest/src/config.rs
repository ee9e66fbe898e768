use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::path_safety::DEFAULT_IGNORABLE_PREFIXES;

/// Configuration for the [`ArchiveIngestor`](crate::ArchiveIngestor).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Where uploads are staged before extraction. `None` uses the system
    /// temporary directory.
    pub temp_dir: Option<PathBuf>,
    /// Largest accepted archive, in bytes.
    pub max_archive_bytes: u64,
    /// Largest total of decompressed file bytes per archive.
    pub max_extracted_bytes: u64,
    /// Entry name prefixes skipped silently (archive tool metadata).
    pub ignorable_prefixes: Vec<String>,
    /// Extensions allowed in addition to the built-in list, e.g. `".wasm"`.
    pub extra_extensions: Vec<String>,
    /// Remove the partially extracted bundle directory when an ingestion
    /// aborts. When `false` the directory is left for the caller to discard.
    pub discard_failed: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            max_archive_bytes: 100 * 1024 * 1024,
            max_extracted_bytes: 1024 * 1024 * 1024,
            ignorable_prefixes: DEFAULT_IGNORABLE_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extra_extensions: Vec::new(),
            discard_failed: true,
        }
    }
}
