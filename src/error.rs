//! Error taxonomy for archive member handles.
//!
//! | Kind | Raised by | Meaning |
//! |------|-----------|---------|
//! | [`BadUrl`] | `open` | URL has no registered scheme or no `:` separator |
//! | [`NotFound`] | `open`, replay | archive parsed but no entry has the member name |
//! | [`Format`] | `open`, replay, `scandir` | archive cannot be opened or parsed |
//! | [`OutOfRange`] | `seek` | target outside `[0, size]`; cursor unchanged |
//! | [`Replay`] | `seek`, `rewind` | session rebuild failed; handle has no session |
//! | [`UnexpectedEof`] | `seek` | member ended before a forward seek reached its target |
//!
//! A short read is not an error; it is a smaller-than-requested count.
//!
//! [`BadUrl`]: VfsError::BadUrl
//! [`NotFound`]: VfsError::NotFound
//! [`Format`]: VfsError::Format
//! [`OutOfRange`]: VfsError::OutOfRange
//! [`Replay`]: VfsError::Replay
//! [`UnexpectedEof`]: VfsError::UnexpectedEof

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Malformed archive URL: {0}")]
    BadUrl(String),

    #[error("Member '{member}' not found in {}", .archive.display())]
    NotFound { archive: PathBuf, member: String },

    #[error("Cannot read archive {}: {reason}", .archive.display())]
    Format { archive: PathBuf, reason: String },

    #[error("Seek target {target} outside member bounds 0..={size}")]
    OutOfRange { target: i128, size: u64 },

    /// The session had to be rebuilt from the start and the rebuild failed.
    #[error("Replay of '{member}' failed: {source}")]
    Replay {
        member: String,
        #[source]
        source: Box<VfsError>,
    },

    #[error("Member ended at offset {reached} before seek target {target}")]
    UnexpectedEof { reached: u64, target: u64 },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    pub(crate) fn format(archive: impl Into<PathBuf>, reason: impl ToString) -> Self {
        VfsError::Format { archive: archive.into(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, VfsError>;
