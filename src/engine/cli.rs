//! CLI run handler: merge config file and flags into [`Opts`], validate, transfer.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::path::Path;

use crate::engine::arg_parser::Cli;
use crate::engine::tools::parse_cutoff;
use crate::engine::validate::validate_opts;
use crate::upload::SseCustomerKey;
use crate::utils::config::S3Consts;
use crate::utils::{
    S3shipToml, apply_file_to_opts, cap_workers_by_fd_limit, get_sse_key, load_s3ship_toml,
    setup_logging,
};
use crate::{KeyLayout, Opts, RunSummary, Target};

/// Overwrite opts field from the command line when given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$cli_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply flags given on the command line over `opts`. Target and encryption are resolved
/// separately since they combine CLI, file and environment.
pub fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) -> Result<()> {
    apply_cli_opt!(cli, opts, path => path);
    if let Some(ref manifest) = cli.input_csv {
        opts.manifest = Some(manifest.clone());
    }
    if !cli.exclude.is_empty() {
        opts.exclude = cli.exclude.clone();
    }
    if let Some(ref t) = cli.newer_than {
        opts.newer_than = parse_cutoff(t)?;
    }
    apply_cli_opt!(cli, opts, workers => workers);
    apply_cli_opt!(cli, opts, policy => policy);
    apply_cli_opt!(cli, opts, dry_run => dry_run);
    if let Some(preserve) = cli.preserve_tree {
        opts.key_layout = if preserve {
            KeyLayout::RelativePath
        } else {
            KeyLayout::BaseName
        };
    }
    apply_cli_opt!(cli, opts, follow_links => follow_links);
    apply_cli_opt!(cli, opts, verbose => verbose);
    apply_cli_opt!(cli, opts, output_success => output_success);
    apply_cli_opt!(cli, opts, output_failure => output_failure);
    Ok(())
}

/// Bucket or local store: a flag on the command line wins over anything in the file.
pub fn resolve_target(cli: &Cli, file: Option<&S3shipToml>) -> Result<Option<Target>> {
    let settings = file.map(|f| &f.settings);
    let region = cli
        .s3_region
        .clone()
        .or_else(|| settings.and_then(|s| s.s3_region.clone()))
        .unwrap_or_else(|| S3Consts::DEFAULT_REGION.to_string());
    let s3 = |bucket: String| Target::S3 {
        bucket,
        region: region.clone(),
    };

    if let Some(ref bucket) = cli.s3_bucket {
        return Ok(Some(s3(bucket.clone())));
    }
    if let Some(ref root) = cli.local_store {
        return Ok(Some(Target::LocalStore { root: root.clone() }));
    }
    match settings.map(|s| (s.s3_bucket.clone(), s.local_store.clone())) {
        Some((Some(_), Some(_))) => {
            bail!("config file sets both s3_bucket and local_store; keep one")
        }
        Some((Some(bucket), None)) => Ok(Some(s3(bucket))),
        Some((None, Some(root))) => Ok(Some(Target::LocalStore { root })),
        _ => Ok(None),
    }
}

/// SSE-C parameters. The algorithm is checked even when no key is configured.
pub fn resolve_encryption(
    cli: &Cli,
    file: Option<&S3shipToml>,
    dir: &Path,
) -> Result<Option<SseCustomerKey>> {
    let algorithm = cli
        .sse_c
        .clone()
        .or_else(|| file.and_then(|f| f.settings.sse_c.clone()))
        .unwrap_or_else(|| SseCustomerKey::ALGORITHM.to_string());
    if algorithm != SseCustomerKey::ALGORITHM {
        bail!("S3 customer algorithm must be {}", SseCustomerKey::ALGORITHM);
    }
    get_sse_key(cli.sse_c_key.as_deref(), dir)
        .map(|key| SseCustomerKey::new(&algorithm, &key))
        .transpose()
}

/// Defaults < config file < command line, then validation and the FD cap.
pub fn setup_opts(cli: &Cli) -> Result<Opts> {
    let cwd = std::env::current_dir().context("can't read the working directory")?;
    let loaded = load_s3ship_toml(cli.config.as_deref(), &cwd);

    let file_verbose = loaded
        .as_ref()
        .ok()
        .and_then(|f| f.as_ref())
        .and_then(S3shipToml::verbose);
    setup_logging(cli.verbose.or(file_verbose).unwrap_or(false));

    let file = match loaded {
        Ok(file) => file,
        Err(e) if cli.config.is_none() => {
            warn!("ignoring config file: {:#}", e);
            None
        }
        Err(e) => return Err(e),
    };

    let mut opts = Opts::default();
    if let Some(ref f) = file {
        apply_file_to_opts(f, &mut opts)?;
    }
    apply_cli_to_opts(cli, &mut opts)?;
    opts.target = resolve_target(cli, file.as_ref())?;
    opts.sse = resolve_encryption(cli, file.as_ref(), &cwd)?;

    validate_opts(&opts)?;

    let (workers, capped) = cap_workers_by_fd_limit(opts.workers);
    if capped {
        warn!(
            "open file limit allows {} concurrent transfers; lowering workers from {}",
            workers, opts.workers
        );
        opts.workers = workers;
    }
    Ok(opts)
}

fn log_summary(summary: &RunSummary) {
    info!(
        "done: {} enumerated, {} uploaded, {} failed",
        summary.enumerated, summary.sink.succeeded, summary.sink.failed
    );
    debug!(
        "scheduler: {} admitted, {} passed through, peak {} in flight, {} barriers",
        summary.scheduler.admitted,
        summary.scheduler.passed_through,
        summary.scheduler.peak_in_flight,
        summary.scheduler.barriers
    );
    if summary.sink.write_errors > 0 {
        warn!(
            "{} result records could not be written",
            summary.sink.write_errors
        );
    }
}

/// Build options from the command line and run one transfer.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli)?;
    if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NOTHING WILL BE UPLOADED.");
    }
    let summary = crate::transfer(&opts)?;
    log_summary(&summary);
    Ok(())
}
