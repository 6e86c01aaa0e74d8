//! s3ship CLI: upload a directory or a manifest of files; --dry-run only enumerates and hashes.

use anyhow::Result;
use clap::Parser;
use s3ship::engine::arg_parser::Cli;
use s3ship::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
