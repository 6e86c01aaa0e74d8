//! Filesystem object store: each key becomes a file under a root directory.

use anyhow::{Context, Result};
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use super::{UploadError, UploadRequest, Uploader};

pub struct LocalStoreUploader {
    root: PathBuf,
}

impl LocalStoreUploader {
    /// Create the store root if needed. Failure here is a setup error.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("create local store at {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("canonicalize local store {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root. Leading slashes are dropped; `..` is refused.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, UploadError> {
        let normalized = key.replace('\\', "/");
        let rel = Path::new(normalized.trim_start_matches('/'));
        if rel.as_os_str().is_empty() {
            return Err(UploadError::Rejected(format!("empty object key '{key}'")));
        }
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(UploadError::Rejected(format!(
                "object key '{key}' escapes the store"
            )));
        }
        Ok(self.root.join(rel))
    }
}

impl Uploader for LocalStoreUploader {
    fn upload(&self, request: UploadRequest<'_>) -> Result<String, UploadError> {
        let dest = self.object_path(request.key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if request.encryption.is_some() {
            debug!("local store ignores SSE-C for {}", request.key);
        }
        let mut body = request.body;
        let mut out = BufWriter::new(File::create(&dest)?);
        let copied = io::copy(&mut body, &mut out)?;
        out.flush()?;
        if copied != request.size_hint {
            debug!(
                "{}: copied {} bytes, expected {}",
                request.key, copied, request.size_hint
            );
        }
        Ok(format!("file://{}", dest.display()))
    }
}
