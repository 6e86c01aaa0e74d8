//! Upload Capability: the seam between the pipeline and a remote object store.
//!
//! The scheduler shares one [`Uploader`] across all transfer threads, so implementations must be
//! stateless per call (or synchronise internally). Backends:
//! - [`s3::S3Uploader`]: AWS S3 (or S3-compatible) bucket.
//! - [`local::LocalStoreUploader`]: a directory on the local filesystem.

pub mod local;
pub mod s3;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use std::fmt;
use std::fs::File;
use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::Target;

pub use local::LocalStoreUploader;
pub use s3::S3Uploader;

/// Transfer failure reported by an [`Uploader`].
#[derive(Debug, Error)]
pub enum UploadError {
    /// The store refused the object or the connection failed. Affects this item only.
    #[error("failed to upload: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The capability itself is unusable (bad credentials, bad region, ...). Aborts the run.
    #[error("upload capability misconfigured: {0}")]
    Misconfigured(String),
}

impl UploadError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, UploadError::Misconfigured(_))
    }
}

/// One transfer: the opened source, where it goes and how big it is expected to be.
pub struct UploadRequest<'a> {
    pub body: File,
    pub key: &'a str,
    pub size_hint: u64,
    pub encryption: Option<&'a SseCustomerKey>,
}

/// Performs the byte transfer for one item. Returns a location string on success.
pub trait Uploader: Send + Sync {
    fn upload(&self, request: UploadRequest<'_>) -> Result<String, UploadError>;
}

/// Establish the upload capability for `target`. Failure is a setup error.
pub fn connect(target: &Target) -> anyhow::Result<Arc<dyn Uploader>> {
    match target {
        Target::S3 { bucket, region } => {
            let uploader = S3Uploader::connect(bucket, region).map_err(|e| {
                anyhow::Error::new(e).context(format!("can't set up S3 client for bucket {bucket}"))
            })?;
            Ok(Arc::new(uploader))
        }
        Target::LocalStore { root } => Ok(Arc::new(LocalStoreUploader::open(root)?)),
    }
}

/// Customer-provided server-side encryption parameters (SSE-C).
#[derive(Clone, PartialEq, Eq)]
pub struct SseCustomerKey {
    algorithm: String,
    key: Vec<u8>,
}

impl SseCustomerKey {
    /// Only algorithm accepted by S3 for SSE-C.
    pub const ALGORITHM: &'static str = "AES256";
    /// SSE-C keys are 256-bit.
    pub const KEY_LEN: usize = 32;

    pub fn new(algorithm: &str, key: &str) -> anyhow::Result<Self> {
        if algorithm != Self::ALGORITHM {
            anyhow::bail!("S3 customer algorithm must be {}", Self::ALGORITHM);
        }
        if key.len() != Self::KEY_LEN {
            anyhow::bail!(
                "S3 customer key must be {} bytes long and not {}",
                Self::KEY_LEN,
                key.len()
            );
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            key: key.as_bytes().to_vec(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn key_base64(&self) -> String {
        STANDARD.encode(&self.key)
    }

    /// Base64 MD5 of the raw key, sent alongside it as an integrity check.
    pub fn key_md5_base64(&self) -> String {
        STANDARD.encode(Md5::digest(&self.key))
    }
}

impl fmt::Debug for SseCustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseCustomerKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}
