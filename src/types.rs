//! Public and internal types for the s3ship API and pipeline.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::error::ItemError;
use crate::upload::SseCustomerKey;
use crate::utils::config::{PackagePaths, WorkerLimits};

/// One unit of transfer work and, once completed, its outcome.
///
/// `failure == None` means "succeeded" for items the Sink receives and "not attempted yet" for
/// items still travelling through the pipeline; the stage holding the item tells which.
#[derive(Debug)]
pub struct ItemDescriptor {
    /// Absolute path of the local file.
    pub source_path: PathBuf,
    /// Hex SHA-256 of the file bytes. Empty when fingerprinting never happened.
    pub content_digest: String,
    /// Bytes hashed at fingerprint time.
    pub byte_size: u64,
    /// Remote object key.
    pub destination_key: String,
    pub failure: Option<ItemError>,
}

impl ItemDescriptor {
    /// Fingerprinted item ready for upload.
    pub fn new(source_path: PathBuf, fingerprint: Fingerprint, destination_key: String) -> Self {
        Self {
            source_path,
            content_digest: fingerprint.digest,
            byte_size: fingerprint.size,
            destination_key,
            failure: None,
        }
    }

    /// Item that failed before it could be fingerprinted.
    pub fn failed(source_path: PathBuf, destination_key: String, failure: ItemError) -> Self {
        Self {
            source_path,
            content_digest: String::new(),
            byte_size: 0,
            destination_key,
            failure: Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Content digest and byte length of one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub digest: String,
    pub size: u64,
}

/// How the scheduler bounds concurrent transfers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
pub enum ConcurrencyPolicy {
    /// Dispatch up to N transfers, wait for every outstanding transfer, repeat.
    #[default]
    #[serde(rename = "burst")]
    #[value(name = "burst")]
    LockstepBurst,
    /// N long-lived workers, each pulling the next item as soon as it is free.
    #[serde(rename = "pool")]
    #[value(name = "pool")]
    SteadyPool,
}

/// How the walk strategy derives destination keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyLayout {
    /// Base name only; directory structure is flattened.
    #[default]
    BaseName,
    /// Path relative to the walk root, `/`-separated.
    RelativePath,
}

/// Where uploads go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    S3 { bucket: String, region: String },
    LocalStore { root: PathBuf },
}

/// Full run options (CLI and lib). Built from defaults, then `.s3ship.toml`, then CLI flags.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Root of the walk. Ignored when `manifest` is set.
    pub path: PathBuf,
    /// Two-column manifest. When set, the manifest strategy is used instead of the walk.
    pub manifest: Option<PathBuf>,
    /// Exclude rules (regex, matched anywhere in the full path).
    pub exclude: Vec<String>,
    /// Skip files modified before this instant.
    pub newer_than: Option<SystemTime>,
    /// Burst size / pool size.
    pub workers: usize,
    pub policy: ConcurrencyPolicy,
    pub key_layout: KeyLayout,
    pub follow_links: bool,
    /// Enumerate and fingerprint only; never contact the store.
    pub dry_run: bool,
    pub verbose: bool,
    pub target: Option<Target>,
    pub sse: Option<SseCustomerKey>,
    pub output_success: PathBuf,
    pub output_failure: PathBuf,
}

impl Default for Opts {
    fn default() -> Self {
        let paths = PackagePaths::get();
        Self {
            path: PathBuf::from("."),
            manifest: None,
            exclude: Vec::new(),
            newer_than: None,
            workers: WorkerLimits::DEFAULT,
            policy: ConcurrencyPolicy::default(),
            key_layout: KeyLayout::default(),
            follow_links: false,
            dry_run: false,
            verbose: false,
            target: None,
            sse: None,
            output_success: PathBuf::from(paths.success_filename()),
            output_failure: PathBuf::from(paths.failure_filename()),
        }
    }
}

/// Counts reported by the Result Sink after draining.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Records whose write (or final flush) reported an error.
    pub write_errors: usize,
}

impl SinkSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Counts reported by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Items handed to the Upload Capability (or that would have been, in dry-run).
    pub admitted: usize,
    /// Items that arrived already failed and went straight to the Sink.
    pub passed_through: usize,
    /// Highest number of transfers observed running at once.
    pub peak_in_flight: usize,
    /// Burst barriers waited on.
    pub barriers: usize,
}

/// Outcome of a full run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub enumerated: usize,
    pub scheduler: SchedulerStats,
    pub sink: SinkSummary,
}
