//! Option validation. Everything rejected here is a setup error; nothing has been read or
//! uploaded yet.

use anyhow::{Result, bail};

use crate::engine::tools::ExcludeRules;
use crate::utils::config::WorkerLimits;
use crate::{Opts, Target};

pub fn validate_opts(opts: &Opts) -> Result<()> {
    if !(WorkerLimits::MIN..=WorkerLimits::MAX).contains(&opts.workers) {
        bail!(
            "workers should be between {} and {}, got {}",
            WorkerLimits::MIN,
            WorkerLimits::MAX,
            opts.workers
        );
    }

    ExcludeRules::new(&opts.exclude)?;

    match &opts.manifest {
        Some(manifest) if !manifest.is_file() => {
            bail!("input csv '{}' is not a readable file", manifest.display())
        }
        Some(_) => {}
        None if !opts.path.is_dir() => {
            bail!("path '{}' is not a directory", opts.path.display())
        }
        None => {}
    }

    match &opts.target {
        None if !opts.dry_run => {
            bail!("no upload target: set --s3-bucket or --local-store (or use --dry-run)")
        }
        Some(Target::S3 { bucket, .. }) if bucket.trim().is_empty() => {
            bail!("S3 bucket name is empty")
        }
        Some(Target::S3 { region, .. }) if region.trim().is_empty() => {
            bail!("S3 region is empty")
        }
        _ => {}
    }

    if opts.output_success == opts.output_failure {
        bail!(
            "success and failure outputs must be different files ({})",
            opts.output_success.display()
        );
    }
    Ok(())
}
