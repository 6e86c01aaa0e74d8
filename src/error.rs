//! Per-item error types. Run-level and setup errors use `anyhow`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::upload::UploadError;

/// Fingerprinting failure. Each I/O stage is its own variant so callers can route it.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("can't get info for {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("can't open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("can't calculate sum for {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
}

/// Why an item ended up in the failure output.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("file on path {reference} can't be absolutized: {source}")]
    Resolve { reference: String, source: io::Error },

    #[error("file on path {reference} can't be found: {source}")]
    Lookup { reference: String, source: io::Error },

    #[error("unable to find file with name {0}")]
    SourceNotFound(String),

    #[error("can't get modification time for {}: {source}", path.display())]
    Mtime { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error("walk error: {0}")]
    Walk(String),

    #[error("manifest line {line}: {message}")]
    Manifest { line: u64, message: String },

    #[error("failed to open file {} for upload: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("error uploading {}: {source}", path.display())]
    Transfer { path: PathBuf, source: UploadError },
}

impl ItemError {
    /// True for upload errors that mean no further transfer can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ItemError::Transfer { source, .. } if source.is_fatal())
    }
}
