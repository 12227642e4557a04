//! Plugin configuration: which extensions become URL schemes, and the
//! look-back ring size handed to every new handle.
//!
//! Stored as JSON.  Absent keys take their defaults:
//!
//! ```json
//! {
//!   "archive.formats": "tar;ar",
//!   "archive.filters": "gz;bz2;xz;lzma;zst;lz4",
//!   "ring_capacity":   5120
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ring::DEFAULT_RING_CAPACITY;

/// Default extensions cover only the containers and filters `open` can decode.
pub const DEFAULT_FORMATS: &str = "tar;ar";
pub const DEFAULT_FILTERS: &str = "gz;bz2;xz;lzma;zst;lz4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// `;`-separated container extensions.
    #[serde(rename = "archive.formats")]
    pub formats:       String,
    /// `;`-separated single-stream filter extensions.
    #[serde(rename = "archive.filters")]
    pub filters:       String,
    pub ring_capacity: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            formats:       DEFAULT_FORMATS.to_owned(),
            filters:       DEFAULT_FILTERS.to_owned(),
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl VfsConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Every configured extension, formats first, in configured order.
    /// Blank items are dropped; duplicates are not removed here.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.formats
            .split(';')
            .chain(self.filters.split(';'))
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
    }
}
