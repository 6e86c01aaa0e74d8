//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    success_filename: String,
    failure_filename: String,
    sse_key_env: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                success_filename: format!("{pkg}.success.csv"),
                failure_filename: format!("{pkg}.failure.csv"),
                sse_key_env: format!("{}_SSE_C_KEY", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the working directory (e.g. `.s3ship.toml`).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    pub fn success_filename(&self) -> &str {
        &self.success_filename
    }

    pub fn failure_filename(&self) -> &str {
        &self.failure_filename
    }

    /// Environment variable holding the SSE-C key (e.g. `S3SHIP_SSE_C_KEY`).
    pub fn sse_key_env(&self) -> &str {
        &self.sse_key_env
    }
}

// ---- Workers ----

/// Burst / pool size bounds.
pub struct WorkerLimits;

impl WorkerLimits {
    pub const DEFAULT: usize = 5;
    pub const MIN: usize = 1;
    pub const MAX: usize = 100;
}

// ---- Hashing ----

/// Hashing I/O buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Working buffer for streaming a file through SHA-256 (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}

// ---- S3 ----

pub struct S3Consts;

impl S3Consts {
    pub const DEFAULT_REGION: &'static str = "eu-west-1";
    /// Multipart part size (bytes). 10 MB.
    pub const PART_SIZE: usize = 10 * 1024 * 1024;
    /// Files larger than this go through multipart upload.
    pub const MULTIPART_THRESHOLD: u64 = Self::PART_SIZE as u64;
}

// ---- Manifest ----

/// Extension token in a manifest source reference that is resolved against the directory.
pub const WILDCARD_TOKEN: &str = "*";
