//! Content fingerprinting (SHA-256).

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::Fingerprint;
use crate::error::FingerprintError;
use crate::utils::config::HashingConsts;

/// Hash a file with SHA-256 through a fixed-size buffer. The reported size is the number of bytes
/// actually hashed, so digest and size always describe the same content.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let meta = std::fs::metadata(path).map_err(|source| FingerprintError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let file = File::open(path).map_err(|source| FingerprintError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let (digest, size) = hash_reader(file).map_err(|source| FingerprintError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if size != meta.len() {
        log::debug!(
            "{} changed while hashing (stat {} bytes, read {})",
            path.display(),
            meta.len(),
            size
        );
    }
    log::debug!("{} size={} sum256={}", path.display(), size, digest);
    Ok(Fingerprint { digest, size })
}

/// Stream `reader` through SHA-256. Returns (lowercase hex digest, bytes read).
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), total))
}
