use clap::Parser;
use std::path::PathBuf;

use crate::ConcurrencyPolicy;

/// Upload a directory tree or a manifest of files to S3, recording per-file results.
#[derive(Clone, Debug, Parser)]
#[command(name = "s3ship", version)]
#[command(about = "Upload files to S3 with bounded concurrency; results go to success/failure CSVs.")]
pub struct Cli {
    /// Root directory to walk. Default: current directory (or `path` in the config file).
    #[arg(long, short = 'p', value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Two-column CSV manifest (source,destination). Replaces the directory walk.
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input_csv: Option<PathBuf>,

    /// Exclude regexps, matched anywhere in the full path. Can specify multiple: -e re1 re2
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Skip files modified before this time (RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD').
    #[arg(long, value_name = "TIME")]
    pub newer_than: Option<String>,

    /// Concurrent uploads per burst (1-100). Default: 5.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// burst: wait for each burst of N uploads to finish; pool: N workers always busy.
    #[arg(long, value_enum)]
    pub policy: Option<ConcurrencyPolicy>,

    /// Enumerate and hash only; nothing is uploaded.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub dry_run: Option<bool>,

    /// Destination bucket.
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Bucket region. Default: eu-west-1.
    #[arg(long)]
    pub s3_region: Option<String>,

    /// SSE-C algorithm. Only AES256 is accepted.
    #[arg(long, value_name = "ALG")]
    pub sse_c: Option<String>,

    /// SSE-C key (32 bytes). Falls back to S3SHIP_SSE_C_KEY / .env.
    #[arg(long, value_name = "KEY")]
    pub sse_c_key: Option<String>,

    /// Upload into this local directory instead of a bucket.
    #[arg(long, value_name = "DIR", conflicts_with = "s3_bucket")]
    pub local_store: Option<PathBuf>,

    /// Keep the directory layout under the root in the destination keys instead of flattening.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub preserve_tree: Option<bool>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Success records output. Default: s3ship.success.csv
    #[arg(long, value_name = "FILE")]
    pub output_success: Option<PathBuf>,

    /// Failure records output. Default: s3ship.failure.csv
    #[arg(long, value_name = "FILE")]
    pub output_failure: Option<PathBuf>,

    /// Config file. Default: .s3ship.toml in the working directory, if present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
