use serde::{Deserialize, Serialize};

use crate::types::ByteSize;

/// How targets are classified and how rotating buffers are enumerated.
///
/// All fields have defaults so the `[reader]` section may be omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Targets whose name ends with this suffix (case-insensitive) are
    /// rotating-buffer index files.
    pub index_suffix: String,
    /// Extension of segment files picked up by a directory catalog.
    pub segment_extension: String,
    /// Nominal size of one segment file. Used to place segments that were
    /// created and deleted between two refreshes.
    pub segment_size: ByteSize,
    /// How many times a torn index file is re-read before giving up.
    pub index_read_attempts: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            index_suffix: ".tsbuffer".to_string(),
            segment_extension: "ts".to_string(),
            segment_size: ByteSize::from(256u64 * 1024 * 1024),
            index_read_attempts: 5,
        }
    }
}
