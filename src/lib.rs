//! s3ship: concurrent file upload pipeline with per-file result records.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod upload;
pub mod utils;

/// Re-export types for API
pub use types::*;

use anyhow::Context;
use log::debug;

use crate::engine::progress::create_counter;
use crate::pipeline::{ResultSink, Scheduler, Source, run_pipeline};

/// Result alias used by public s3ship API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: enumerate, fingerprint and upload according to `opts`, writing one
/// result record per item to the success or failure output.
///
/// `opts` is taken as is; CLI callers go through [`engine::setup_opts`] for validation. Errors
/// are setup errors (root or manifest missing, target unreachable, outputs not creatable) or a
/// fatal upload misconfiguration discovered mid-run. Per-file problems only show up in the
/// failure output and in [`RunSummary`].
pub fn transfer(opts: &Opts) -> Result<RunSummary> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let source = Source::from_opts(opts)?;
    let mut scheduler = Scheduler::from_opts(opts);
    if !opts.dry_run {
        let target = opts
            .target
            .as_ref()
            .context("no upload target configured")?;
        scheduler = scheduler.uploader(upload::connect(target)?);
    }

    let mut sink = ResultSink::create(&opts.output_success, &opts.output_failure)?;
    if opts.verbose {
        sink = sink.with_progress(create_counter("Transferred"));
    }

    debug!(
        "{} strategy, {} workers, {:?}",
        source.strategy_name(),
        scheduler.workers(),
        opts.policy
    );
    run_pipeline(source, scheduler, &mut sink)
}
